//! # FileAnnotations Common Library
//!
//! Shared code for the FileAnnotations services:
//! - Common error type
//! - Bootstrap configuration (TOML) and root folder resolution
//! - Timestamp utilities and the injectable clock

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};
