//! termgrid configuration
//!
//! User settings stored as JSON under the platform config directory.

pub mod settings;

pub use settings::Settings;
