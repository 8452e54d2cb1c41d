//! Campaign slice.
//!
//! Holds each campaign's event schedule and the award ledgers of its
//! players. Adding events rebuilds the campaign maxima; applying awards
//! re-runs the player's ledger against them.

mod error;
#[cfg(feature = "server")]
mod handlers;
pub mod models;
mod service;
pub mod store;

pub use crate::error::{CampaignError, CampaignErrorExt};
#[cfg(feature = "server")]
pub use crate::handlers::router;

use crate::store::CampaignStore;
use larp_kernel::domain::config::ApiConfig;
use larp_kernel::domain::registry::InitializedSlice;

#[larp_derive::larp_slice]
pub struct Campaigns {
    store: CampaignStore,
}

impl Default for Campaigns {
    fn default() -> Self {
        Self::new(CampaignsInner { store: CampaignStore::default() })
    }
}

/// Builds an empty campaign slice.
///
/// # Errors
/// Never fails today; the signature matches the other slices.
pub fn init(_config: &ApiConfig) -> Result<InitializedSlice, CampaignError> {
    tracing::info!("Campaign slice initialized");
    Ok(InitializedSlice::new(Campaigns::default()))
}
