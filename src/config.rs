use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub refresh: RefreshConfig,
    pub renderer: RendererConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between refresh cycles.
    pub period_secs: u64,
    /// Search-result pages scanned per cycle.
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Bounded wait for the page-complete indicator.
    pub page_load_timeout_secs: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Built-in defaults so the binary runs without any config file
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001)?
            .set_default("refresh.period_secs", 600)?
            .set_default("refresh.pages", 3)?
            .set_default("renderer.page_load_timeout_secs", 30)?
            .set_default(
                "renderer.user_agent",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            )?
            // Optional file layering, then TERAWATCH__-prefixed env vars
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("TERAWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.renderer.chrome_path.is_none() {
            config.renderer.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".into(),
            ));
        }

        if self.refresh.period_secs == 0 {
            return Err(ConfigError::Message(
                "Refresh period_secs must be greater than 0".into(),
            ));
        }

        if self.refresh.pages == 0 {
            return Err(ConfigError::Message(
                "Refresh pages must be greater than 0".into(),
            ));
        }

        if self.renderer.page_load_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Renderer page_load_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3001,
            },
            refresh: RefreshConfig {
                period_secs: 600,
                pages: 3,
            },
            renderer: RendererConfig {
                page_load_timeout_secs: 30,
                user_agent: "TestAgent/1.0".to_string(),
                chrome_path: None,
            },
        }
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = valid_config();
        config.server.port = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("port must be greater than 0"));
    }

    #[test]
    fn test_config_validation_zero_period() {
        let mut config = valid_config();
        config.refresh.period_secs = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("period_secs must be greater than 0"));
    }

    #[test]
    fn test_config_validation_zero_pages() {
        let mut config = valid_config();
        config.refresh.pages = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = valid_config();
        config.renderer.page_load_timeout_secs = 0;

        assert!(config.validate().is_err());
    }
}
