//! Attribute-based access control: the declarative Access Model, the
//! expression evaluator and glob matcher it's built on, the engine that
//! evaluates it against a request, and the query filter it can produce.

pub mod engine;
pub mod expr;
pub mod filter;
pub mod glob;
pub mod model;

use std::sync::Arc;

use parking_lot::RwLock;

pub use engine::{PolicyEngine, Verdict};
pub use filter::{BoundValue, QueryFilter};
pub use model::{AccessModel, PolicyLoadError, Right};

/// A hot-swappable handle to the current `AccessModel`. Reloading the
/// policy document (e.g. on SIGHUP or a periodic poll) replaces the
/// pointer atomically; in-flight requests keep evaluating against
/// whichever snapshot they already loaded.
#[derive(Default)]
pub struct AccessModelHandle(RwLock<Option<Arc<AccessModel>>>);

impl AccessModelHandle {
    pub fn empty() -> Self {
        Self(RwLock::new(None))
    }

    pub fn store(&self, model: AccessModel) {
        *self.0.write() = Some(Arc::new(model));
    }

    pub fn load(&self) -> Option<Arc<AccessModel>> {
        self.0.read().clone()
    }
}
