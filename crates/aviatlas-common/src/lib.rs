//! AviAtlas Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the AviAtlas workspace.
//!
//! - **Error Handling**: [`AviatlasError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use aviatlas_common::logging::{init_logging, LogConfig};
//! use aviatlas_common::{AviatlasError, Result};
//!
//! fn start() -> Result<()> {
//!     let config = LogConfig::from_env().map_err(|e| AviatlasError::Config(e.to_string()))?;
//!     init_logging(&config).map_err(|e| AviatlasError::Config(e.to_string()))?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{AviatlasError, Result};
