//! gemflash - client-side state and request orchestration for a remote
//! image generation service.
//!
//! The [`studio`] module owns the image pools, selection, transfer pipeline and
//! progress simulation; [`config`] loads the TOML settings used by the CLI.

pub mod config;
pub mod studio;

pub use config::StudioConfig;
pub use studio::{Studio, StudioError};
