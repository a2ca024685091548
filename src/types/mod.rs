//! Type definitions for usage-meter

mod day_key;
mod error;
mod usage;

pub use day_key::*;
pub use error::*;
pub use usage::*;
