//! Logging setup

use crate::SettingsError;
use tracing::Level;

/// Parse a level name (`trace` .. `error`, case-insensitive).
pub fn parse_level(name: &str) -> Result<Level, SettingsError> {
    name.trim()
        .parse::<Level>()
        .map_err(|_| SettingsError::LogLevel(name.to_string()))
}

/// Install the global fmt subscriber. Later calls are ignored, so tests and
/// embedders that already installed one keep it.
pub fn init(level: Level) {
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(%level, "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level(" WARN ").unwrap(), Level::WARN);
        assert!(matches!(parse_level("loud"), Err(SettingsError::LogLevel(_))));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Level::INFO);
        init(Level::TRACE);
    }
}
