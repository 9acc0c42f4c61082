//! Discovery service binary: loads configuration, provisions the
//! Postgres pool and Access Model, and serves the guarded HTTP surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::middleware;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use aas_discovery_core::error::AppError;
use aas_discovery_core::guard::request_guard;
use aas_discovery_core::http::{router, AppState};
use aas_discovery_core::policy::AccessModelHandle;
use aas_discovery_core::search::SearchEngine;
use aas_discovery_core::store::{build_pool, LinkStore};
use aas_discovery_core::token::JwtTokenVerifier;
use aas_discovery_core::{init_logging_with_level, AccessModel, AppConfig};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "AAS discovery service: asset-link lookup guarded by an ABAC policy engine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging (DEBUG level). Default is INFO level.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all non-essential logging (ERROR level only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

/// Reads the access model document (and its optional schema) from disk
/// and stores it in `handle`. Called once at startup; the spec requires
/// the service to fail fast if ABAC is enabled but the model can't be
/// loaded.
fn load_access_model(config: &AppConfig, handle: &AccessModelHandle) -> Result<()> {
    let Some(model_path) = config.abac.model_path.as_deref() else {
        return Ok(());
    };

    let bytes = std::fs::read(model_path)
        .with_context(|| format!("reading access model at {model_path}"))?;

    let schema_bytes = if config.abac.validate {
        match config.abac.schema_path.as_deref() {
            Some(schema_path) => Some(
                std::fs::read(schema_path)
                    .with_context(|| format!("reading access model schema at {schema_path}"))?,
            ),
            None => None,
        }
    } else {
        None
    };

    let model = AccessModel::load(&bytes, schema_bytes.as_deref())
        .with_context(|| format!("loading access model at {model_path}"))?;

    handle.store(model);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = init_logging_with_level(cli.verbose, cli.quiet);

    let config = AppConfig::load().context("loading configuration")?;
    config
        .fail_fast_if_abac_unloadable()
        .map_err(|e: AppError| anyhow::anyhow!(e))?;

    let pool = build_pool(&config.postgres)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let access_model = AccessModelHandle::empty();
    if config.abac.enabled {
        load_access_model(&config, &access_model)?;
    }

    let state = Arc::new(AppState {
        link_store: LinkStore::new(pool.clone()),
        search_engine: SearchEngine::new(pool),
        token_verifier: Arc::new(JwtTokenVerifier::new(config.oidc.clone())),
        access_model,
        abac: config.abac.clone(),
    });

    let app = router(state.clone())
        .layer(middleware::from_fn_with_state(state, request_guard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.server.port);
    tracing::info!(%addr, "starting discovery service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("serving discovery service")?;

    Ok(())
}
