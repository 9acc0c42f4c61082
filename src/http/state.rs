//! Shared application state, built once at startup and cloned (cheaply,
//! via `Arc`) into every request.

use std::sync::Arc;

use crate::config::AbacConfig;
use crate::policy::AccessModelHandle;
use crate::search::SearchEngine;
use crate::store::LinkStore;
use crate::token::TokenVerifier;

pub struct AppState {
    pub link_store: LinkStore,
    pub search_engine: SearchEngine,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub access_model: AccessModelHandle,
    pub abac: AbacConfig,
}
