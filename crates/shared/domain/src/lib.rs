//! # Domain
//!
//! Plain data shared by every crate: configuration, constants, refresh
//! targets for enhanced clients, and the slice registry. Only `serde` and
//! `bitflags` are allowed here.

pub mod config;
pub mod constants;
pub mod refresh;
pub mod registry;
