#![forbid(unsafe_code)]

pub mod analytics;
pub mod error;
pub mod model;
pub mod time;
pub mod validation;

pub use error::Error;
pub use time::Clock;
