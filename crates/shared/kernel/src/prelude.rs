//! Common imports for slice crates.

pub use crate::config::{ConfigError, load_config};
pub use crate::domain::config::ApiConfig;
pub use crate::domain::refresh::RefreshTargets;
pub use crate::domain::registry::{FeatureSlice, InitializedSlice};
pub use crate::ids::{IdError, validate_id};
pub use crate::safe_nanoid;

#[cfg(feature = "server")]
pub use crate::server::{
    enhanced::{Enhanced, Outcome},
    error::ErrorBody,
    state::ApiState,
};
