//! # Wavecast Common Library
//!
//! Shared code for the wavecast workspace including:
//! - Error and result types
//! - Configuration loading and validation
//! - SQLite item store (idempotent ingestion)
//! - Fade curve definitions used by audio assembly

pub mod config;
pub mod db;
pub mod error;
pub mod fade_curves;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
