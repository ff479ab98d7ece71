//! Log level policy shared by the console sink in `shelf-wasm`.

use log::LevelFilter;

use crate::config::ConfigError;

/// Parses a level name (`trace|debug|info|warn|warning|error|off`), ignoring case and
/// surrounding whitespace.
pub fn parse_level(level: &str) -> Result<LevelFilter, ConfigError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::Trace),
        "debug" => Ok(LevelFilter::Debug),
        "info" => Ok(LevelFilter::Info),
        "warn" | "warning" => Ok(LevelFilter::Warn),
        "error" => Ok(LevelFilter::Error),
        "off" => Ok(LevelFilter::Off),
        other => Err(ConfigError::UnknownLogLevel(other.to_string())),
    }
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Resolves an optional host-supplied level, falling back to [`default_level`].
pub fn resolve_level(level: Option<&str>) -> Result<LevelFilter, ConfigError> {
    match level {
        Some(level) if !level.trim().is_empty() => parse_level(level),
        _ => Ok(default_level()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_known_values() {
        assert_eq!(parse_level("INFO").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level(" warning ").unwrap(), LevelFilter::Warn);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::Off);
    }

    #[test]
    fn parse_level_rejects_unknown_values() {
        let err = parse_level("verbose").unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn blank_level_uses_build_default() {
        assert_eq!(resolve_level(None).unwrap(), default_level());
        assert_eq!(resolve_level(Some("")).unwrap(), default_level());
        assert_eq!(resolve_level(Some("error")).unwrap(), LevelFilter::Error);
    }
}
