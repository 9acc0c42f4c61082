//! Structured logging setup.
//!
//! `RUST_LOG` always wins if set; otherwise `--quiet`/`--verbose` select a
//! sensible default filter scoped to this crate.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("aas_discovery_core=debug,info")
    } else {
        EnvFilter::new("aas_discovery_core=info,warn")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init() {
        Ok(()) => {
            if !quiet {
                info!("discovery service observability initialized");
            }
            Ok(())
        }
        // Already initialized — fine in test environments where multiple
        // tests call this within one process.
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_strings_parse_for_every_verbosity_combination() {
        for filter_str in ["error", "aas_discovery_core=debug,info", "aas_discovery_core=info,warn"] {
            assert!(EnvFilter::try_new(filter_str).is_ok());
        }
    }
}
