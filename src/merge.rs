use std::collections::btree_map::Entry;

use tracing::trace;

use crate::entry::{ComponentEntry, ComponentSet};

/// Combine declarations from several sources into one canonical set.
///
/// For every identity the entry with the highest requirement level wins.
/// Between entries of equal level the first one seen is kept. No identity
/// present in any source is dropped.
pub fn merge<I, S>(sources: I) -> ComponentSet
where
    I: IntoIterator<Item = S>,
    S: IntoIterator<Item = ComponentEntry>,
{
    let mut set = ComponentSet::new();
    for entry in sources.into_iter().flatten() {
        match set.entry(entry.id().to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
            Entry::Occupied(mut winner) => {
                if entry.requirement().supersedes(winner.get().requirement()) {
                    trace!(
                        "{} ({}) replaces {} ({})",
                        entry,
                        entry.requirement(),
                        winner.get(),
                        winner.get().requirement()
                    );
                    winner.insert(entry);
                }
            }
        }
    }
    set
}

/// Shorthand for merging a single stream of entries.
pub fn merge_entries<S>(entries: S) -> ComponentSet
where
    S: IntoIterator<Item = ComponentEntry>,
{
    merge(std::iter::once(entries))
}
