//! Hostbridge Services Layer
//!
//! Process-level concerns shared by the runtime binary: settings and logging.

pub mod logging;
pub mod settings;

pub use settings::{Settings, SettingsError};
