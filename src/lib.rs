//! Python-importable build of the AVD navigation environment.
//!
//! The Rust API is re-exported unchanged; the `python` feature adds the
//! extension module.

pub use avd_nav::*;

#[cfg(feature = "python")]
mod python;
