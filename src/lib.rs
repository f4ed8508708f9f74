pub mod errors;
pub mod context;
pub mod expression;
pub mod factory;
pub mod kinds;
pub mod options;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod signals;
pub mod store;
pub mod visibility;
mod parser;

use errors::Result;
use factory::{ContextFactory, ContextRow};
use registry::{ActiveContextSet, ContextRegistry};
use signals::Request;

/// Build contexts from `rows` with the built-in kinds and resolve the ones
/// active for `request`. Rows of unknown types are skipped.
pub fn activate(rows: &[ContextRow], request: &mut Request<'_>) -> Result<ActiveContextSet> {
    let contexts = ContextFactory::default().create_all(rows)?;
    ContextRegistry::resolve_active(&contexts, request)
}

/// Re-export the most-used types for callers wiring up a request.
pub use context::{Context, ContextKind};
pub use errors::ContextError;
pub use options::{EngineOptions, TableOptions};
pub use settings::{decode_flat_setting, Record, Setting};
pub use signals::{MemorySession, RequestSignals};
pub use store::MemoryStore;
pub use visibility::VisibilityIndex;
