pub mod config;
pub mod error;
pub mod types;

pub use config::AugurConfig;
pub use error::{AugurError, Result};
pub use types::*;
