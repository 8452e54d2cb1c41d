pub mod enhanced;
pub mod error;
mod health;
pub mod router;
pub mod state;

pub use router::system_router;
