//! modsync-cli library
//!
//! Command line helpers around the `modsync` negotiation crate. They work
//! on component manifests (TOML files listing `[[components]]`) so a server
//! operator can see what would be offered and check a pairing offline.
//!
//! Commands
//! - `merge`: print the canonical set built from manifests and the
//!   configured extra components.
//! - `verify`: compare a local and a peer manifest; exit code 2 when the
//!   pairing is incompatible.
//! - `offer` / `inspect`: write a framed offer payload to a file and read
//!   one back.
//! - `config show` / `config path`: the effective negotiation settings.
//!
//! Configuration
//! - Read from `--config FILE`, otherwise from
//!   $XDG_CONFIG_HOME/modsync/config.toml or
//!   $HOME/.config/modsync/config.toml. A missing file means defaults.
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use modsync::{
    merge, ComponentPayload, ComponentSet, Manifest,
    ManifestInventory, NegotiationConfig, NegotiationContext,
    NegotiationState, Perspective, Role, Verdict, VersionPolicyKind,
};
use tracing::debug;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Exit code of `verify` for an incompatible pairing.
pub const EXIT_INCOMPATIBLE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "modsync-cli", version)]
#[command(about = "Component compatibility negotiation tool", long_about = None)]
pub struct Cli {
    /// Print diagnostic logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the canonical set built from manifests and configuration
    Merge {
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check whether two installations may connect
    Verify {
        #[arg(long)]
        local: PathBuf,
        #[arg(long)]
        peer: PathBuf,
        #[arg(long, value_enum, default_value_t = RoleArg::Server)]
        role: RoleArg,
        /// Phrase the reason for the peer instead of the local side
        #[arg(long)]
        as_peer: bool,
        /// Require exact version matches
        #[arg(long)]
        exact: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the framed offer payload for a manifest
    Offer {
        manifest: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Decode a framed payload and list its components
    Inspect { payload: PathBuf },
    /// Show negotiation settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration file location
    Path,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Server,
    Client,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Server => Role::Server,
            RoleArg::Client => Role::Client,
        }
    }
}

pub fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli.command)
}

pub fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Merge { manifests, config } => {
            let config = load_config(config.as_deref())?;
            let set = merge_manifests(&manifests, &config)?;
            print!("{}", render_set(&set));
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify {
            local,
            peer,
            role,
            as_peer,
            exact,
            config,
        } => {
            let mut config = load_config(config.as_deref())?;
            if exact {
                config.version_policy = VersionPolicyKind::Exact;
            }
            let perspective = if as_peer {
                Perspective::AsPeer
            } else {
                Perspective::AsLocal
            };
            let verdict = verify_manifests(
                &local,
                &peer,
                role.into(),
                perspective,
                config,
            )?;
            println!("{}", verdict);
            Ok(if verdict.is_compatible() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INCOMPATIBLE)
            })
        }
        Command::Offer {
            manifest,
            out,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let set = merge_manifests(&[manifest], &config)?;
            let frame = ComponentPayload::new(&set).encode()?;
            fs::write(&out, &frame).with_context(|| {
                format!("Failed to write payload: {}", out.display())
            })?;
            println!(
                "Wrote {} components ({} bytes) to {}",
                set.len(),
                frame.len(),
                out.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Inspect { payload } => {
            let frame = fs::read(&payload).with_context(|| {
                format!("Failed to read payload: {}", payload.display())
            })?;
            let payload = ComponentPayload::decode(&frame)
                .with_context(|| "Failed to decode payload")?;
            println!("Protocol version: {}", payload.protocol_version);
            print!("{}", render_set(&payload.into_set()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { command } => match command {
            ConfigCommand::Show { config } => {
                let config = load_config(config.as_deref())?;
                let rendered = toml::to_string_pretty(&config)
                    .with_context(|| "Failed to serialize config")?;
                print!("{}", rendered);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCommand::Path => {
                println!("{}", NegotiationConfig::config_file()?.display());
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

/// Loads `path` when given, else the default location.
pub fn load_config(path: Option<&Path>) -> Result<NegotiationConfig> {
    let config = match path {
        Some(path) => NegotiationConfig::load_from(path).with_context(|| {
            format!("Failed to load config file: {}", path.display())
        })?,
        None => NegotiationConfig::load()
            .with_context(|| "Failed to load default config file")?,
    };
    debug!("Using configuration: {:?}", config);
    Ok(config)
}

/// Merges manifests in order, then the configured extra components.
pub fn merge_manifests(
    manifests: &[PathBuf],
    config: &NegotiationConfig,
) -> Result<ComponentSet> {
    let mut sources = Vec::with_capacity(manifests.len() + 1);
    for path in manifests {
        sources.push(read_manifest(path)?);
    }
    sources.push(config.extra_required_components()?);
    Ok(merge(sources))
}

pub fn verify_manifests(
    local: &Path,
    peer: &Path,
    role: Role,
    perspective: Perspective,
    config: NegotiationConfig,
) -> Result<Verdict> {
    let ctx = NegotiationContext::new(
        role,
        config,
        Arc::new(ManifestInventory::new(local)),
    );
    let local = ctx.local_components().with_context(|| {
        format!("Failed to read manifest: {}", local.display())
    })?;
    let peer = Arc::new(merge([read_manifest(peer)?]));
    let state = NegotiationState::new(role, local, peer);
    Ok(ctx.verifier().verify(&state, perspective))
}

pub fn render_set(set: &ComponentSet) -> String {
    set.iter()
        .map(|e| format!("{}\t{}\t{}\n", e.id(), e.version(), e.requirement()))
        .collect()
}

fn read_manifest(path: &Path) -> Result<Vec<modsync::ComponentEntry>> {
    let manifest = Manifest::load(path).with_context(|| {
        format!("Failed to read manifest: {}", path.display())
    })?;
    manifest
        .entries()
        .with_context(|| format!("Invalid manifest: {}", path.display()))
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
