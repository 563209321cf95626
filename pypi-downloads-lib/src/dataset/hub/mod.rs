//! The hosted dataset repository.

mod client;
mod store;

pub use client::{Client, DEFAULT_HUB_ENDPOINT, LfsPointer, RepoId};
pub use store::HubStore;
