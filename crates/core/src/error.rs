use thiserror::Error;

use crate::model::{CompletionError, ProgramError, TargetError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}
