//! HTTP API layer.

pub mod analysis;
pub mod chat;
pub mod error;
pub mod extract;
pub mod health;
pub mod router;
pub mod sessions;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use router::build_router;
pub use state::AppState;
