use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::plugin::FfmpegConfig;
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.scheduler.max_running, 1);
        assert_eq!(config.ffmpeg.formats, vec![".flv".to_string()]);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[scheduler]
max_running = 4
retry_limit = 3
retry_backoff_ms = 500
callback_timeout_ms = 1000

[ffmpeg]
ffmpeg_path = "/usr/local/bin/ffmpeg"
timeout_secs = 600
formats = [".flv", "mkv"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.scheduler.max_running, 4);
        assert_eq!(config.scheduler.retry_limit, 3);
        assert_eq!(config.scheduler.retry_backoff_ms, 500);
        assert_eq!(config.scheduler.callback_timeout_ms, 1000);
        assert_eq!(
            config.ffmpeg.ffmpeg_path.to_str().unwrap(),
            "/usr/local/bin/ffmpeg"
        );
        assert_eq!(config.ffmpeg.timeout_secs, 600);
        assert_eq!(config.ffmpeg.formats.len(), 2);
    }

    #[test]
    fn test_invalid_host_fails() {
        let toml = r#"
[server]
host = "not-an-ip"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
