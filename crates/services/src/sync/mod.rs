//! Reconciliation of local session state with the backend's copy.

mod conflict;

pub use conflict::{Conflict, ConflictField, ConflictResolver, ConflictWinner, ResolutionStrategy};
