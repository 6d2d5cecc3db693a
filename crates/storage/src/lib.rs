#![forbid(unsafe_code)]

pub mod repository;

pub use repository::{
    CompletionRepository, InMemoryRepository, PositionPatch, ProgramRepository,
    ProgressRepository, Storage, StorageError,
};
