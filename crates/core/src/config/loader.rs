use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment variables that override file settings.
const ENV_PREFIX: &str = "TRANSD_";

/// File settings layered under `TRANSD_` environment overrides.
///
/// Nested keys are separated by `__` so field names keep their underscores:
/// `TRANSD_SCHEDULER__MAX_RUNNING=4` sets `scheduler.max_running`.
fn layered(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from a TOML file with environment overrides applied.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    layered(path)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from a TOML string, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = load_config_from_str("[scheduler]\nmax_running = 2\n").unwrap();
        assert_eq!(config.scheduler.max_running, 2);
        assert_eq!(config.scheduler.retry_limit, 1);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ffmpeg.formats, vec![".flv"]);
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let result = load_config_from_str("[scheduler]\nmax_running = \"many\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Path::new("/nonexistent/transd.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_file_settings() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "transd.toml",
                r#"
[server]
host = "127.0.0.1"
port = 3000

[ffmpeg]
formats = [".flv", ".ts"]
"#,
            )?;

            let config = load_config(Path::new("transd.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.host.to_string(), "127.0.0.1");
            assert_eq!(config.server.port, 3000);
            assert_eq!(config.ffmpeg.formats, vec![".flv", ".ts"]);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("transd.toml", "[scheduler]\nmax_running = 2\nretry_limit = 3\n")?;
            jail.set_env("TRANSD_SCHEDULER__MAX_RUNNING", "6");
            jail.set_env("TRANSD_SERVER__PORT", "9100");

            let config = load_config(Path::new("transd.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.max_running, 6);
            assert_eq!(config.scheduler.retry_limit, 3);
            assert_eq!(config.server.port, 9100);
            Ok(())
        });
    }

    #[test]
    fn test_env_value_of_wrong_type() {
        Jail::expect_with(|jail| {
            jail.create_file("transd.toml", "")?;
            jail.set_env("TRANSD_SCHEDULER__RETRY_LIMIT", "often");

            let result = load_config(Path::new("transd.toml"));
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }
}
