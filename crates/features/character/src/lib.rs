//! Character sheet slice.
//!
//! Sheets live in memory next to the loaded [`Engine`]. Every committed
//! mutation leaves an undo entry holding the previous model; the history is
//! bounded by `rules.undo_stack_size` and cleared when a respend is
//! finalized.

mod error;
#[cfg(feature = "server")]
mod handlers;
pub mod models;
mod service;
pub mod store;

pub use crate::error::{CharacterError, CharacterErrorExt};
#[cfg(feature = "server")]
pub use crate::handlers::router;

use crate::store::CharacterStore;
use larp_kernel::domain::config::ApiConfig;
use larp_kernel::domain::registry::InitializedSlice;
use larp_rules::{Engine, load_ruleset, load_ruleset_strict};
use std::sync::Arc;

/// Character slice state.
#[larp_derive::larp_slice]
pub struct Characters {
    engine: Engine,
    store: CharacterStore,
}

impl Characters {
    #[must_use]
    pub fn with_engine(engine: Engine, undo_limit: usize) -> Self {
        Self::new(CharactersInner { engine, store: CharacterStore::new(undo_limit) })
    }
}

/// Loads the configured ruleset and builds the slice.
///
/// # Errors
/// Fails when the ruleset can't be loaded, or in strict mode when any
/// definition is broken.
pub fn init(config: &ApiConfig) -> Result<InitializedSlice, CharacterError> {
    let rules = &config.rules;
    let loaded = if rules.strict { load_ruleset_strict(&rules.ruleset_dir) } else { load_ruleset(&rules.ruleset_dir) };
    let ruleset = loaded.context(format!("loading {}", rules.ruleset_dir.display()))?;
    tracing::info!(
        ruleset = %ruleset.id,
        version = %ruleset.version,
        undo_stack_size = rules.undo_stack_size,
        "Character slice initialized"
    );

    let slice = Characters::with_engine(Engine::new(Arc::new(ruleset)), rules.undo_stack_size);
    Ok(InitializedSlice::new(slice))
}
