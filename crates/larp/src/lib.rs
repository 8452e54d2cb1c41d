//! Facade over the larp rules engine and its feature slices.
//! Re-exports the shared crates and aggregates slice initialization so
//! binaries depend on one crate.
//!
//! ## Usage
//! - Add `larp` with the `server` feature for the HTTP surface.
//! - Call [`init`] to build every slice, then register them with the API state.

pub use larp_domain as domain;
pub use larp_kernel as kernel;
pub use larp_rules as rules;

use larp_domain::config::ApiConfig;
use larp_domain::registry::InitializedSlice;
use std::borrow::Cow;

#[cfg(feature = "server")]
pub mod server {
    pub mod router {
        pub use larp_kernel::server::router::system_router;
        use larp_kernel::server::state::ApiState;
        use utoipa_axum::router::OpenApiRouter;

        /// Routes of every enabled slice.
        #[must_use]
        pub fn feature_router() -> OpenApiRouter<ApiState> {
            OpenApiRouter::new()
                .merge(crate::features::character::router())
                .merge(crate::features::campaign::router())
        }
    }
}

pub mod features {
    pub use larp_campaign as campaign;
    pub use larp_character as character;

    /// Build-time enabled features (by Cargo feature).
    pub const ENABLED: &[&str] = &[
        #[cfg(feature = "server")]
        "server",
        "character",
        "campaign",
    ];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

#[larp_derive::larp_error]
pub enum InitError {
    #[error("Character slice{}: {source}", format_context(.context))]
    Character { source: larp_character::CharacterError, context: Option<Cow<'static, str>> },
    #[error("Campaign slice{}: {source}", format_context(.context))]
    Campaign { source: larp_campaign::CampaignError, context: Option<Cow<'static, str>> },
}

/// Initializes every slice.
///
/// # Errors
/// Fails when any slice fails to initialize, e.g. an unreadable ruleset.
pub fn init(config: &ApiConfig) -> Result<Vec<InitializedSlice>, InitError> {
    let slices = vec![features::character::init(config)?, features::campaign::init(config)?];
    Ok(slices)
}
