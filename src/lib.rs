pub mod config;
pub mod core;
pub mod error;

pub use crate::config::Config;
pub use crate::core::Engine;
pub use crate::error::{CulpritError, Result};
