use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::errors::{ModsyncError, Result};

/// Run code that handles peer-supplied data.
///
/// Errors and panics raised by `f` are logged under `label` and turned into
/// [`ModsyncError::UntrustedPayloadFault`]; they never unwind into the
/// caller.
pub fn invoke_untrusted<T, F>(label: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("{}: {}", label, e);
            Err(ModsyncError::UntrustedPayloadFault(format!("{}: {}", label, e)))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("{}: panicked: {}", label, message);
            Err(ModsyncError::UntrustedPayloadFault(format!(
                "{}: panicked: {}",
                label, message
            )))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
