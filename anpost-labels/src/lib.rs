mod client;
mod types;

pub use client::{LabelClient, SUBSCRIPTION_KEY_HEADER};
pub use types::*;
