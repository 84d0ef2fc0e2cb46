mod config;
mod error;
pub mod helpers;
mod types;

pub use config::*;
pub use error::ReturnsError;
pub use types::*;
