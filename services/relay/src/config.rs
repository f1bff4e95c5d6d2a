use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub realtime_url: String,
    pub realtime_model: String,
    pub openai_api_key: Option<String>,
    pub agents_path: PathBuf,
    /// Agent to start with. Defaults to the first agent in the manifest.
    pub initial_agent: Option<String>,
    pub tool_timeout: Option<Duration>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let realtime_url = std::env::var("REALTIME_URL")
            .unwrap_or_else(|_| "wss://api.openai.com/v1/realtime".to_string());
        if !(realtime_url.starts_with("ws://") || realtime_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue(
                "REALTIME_URL".to_string(),
                format!("'{}' is not a ws:// or wss:// URL", realtime_url),
            ));
        }

        let realtime_model = std::env::var("REALTIME_MODEL")
            .unwrap_or_else(|_| "gpt-4o-realtime-preview-2024-12-17".to_string());

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        let agents_path = std::env::var("AGENTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./agents.json"));

        let initial_agent = std::env::var("INITIAL_AGENT")
            .ok()
            .filter(|name| !name.is_empty());

        let tool_timeout = match std::env::var("TOOL_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "TOOL_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", raw),
                    )
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            realtime_url,
            realtime_model,
            openai_api_key,
            agents_path,
            initial_agent,
            tool_timeout,
            log_level,
        })
    }

    /// The websocket URL to dial, with the model as a query parameter.
    pub fn connect_url(&self) -> String {
        let separator = if self.realtime_url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.realtime_url, separator, self.realtime_model)
    }

    /// The API key, which only a live connection needs.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("REALTIME_URL");
            env::remove_var("REALTIME_MODEL");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("AGENTS_PATH");
            env::remove_var("INITIAL_AGENT");
            env::remove_var("TOOL_TIMEOUT_SECS");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.realtime_url, "wss://api.openai.com/v1/realtime");
        assert_eq!(config.realtime_model, "gpt-4o-realtime-preview-2024-12-17");
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.agents_path, PathBuf::from("./agents.json"));
        assert_eq!(config.initial_agent, None);
        assert_eq!(config.tool_timeout, None);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(
            config.connect_url(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-12-17"
        );
        assert!(matches!(
            config.require_api_key(),
            Err(ConfigError::MissingVar(var)) if var == "OPENAI_API_KEY"
        ));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("REALTIME_URL", "ws://localhost:9000/realtime?debug=1");
            env::set_var("REALTIME_MODEL", "test-model");
            env::set_var("OPENAI_API_KEY", "test-key");
            env::set_var("AGENTS_PATH", "/etc/switchboard/agents.json");
            env::set_var("INITIAL_AGENT", "billing");
            env::set_var("TOOL_TIMEOUT_SECS", "15");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(
            config.connect_url(),
            "ws://localhost:9000/realtime?debug=1&model=test-model"
        );
        assert_eq!(config.require_api_key().unwrap(), "test-key");
        assert_eq!(
            config.agents_path,
            PathBuf::from("/etc/switchboard/agents.json")
        );
        assert_eq!(config.initial_agent.as_deref(), Some("billing"));
        assert_eq!(config.tool_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_invalid_url() {
        clear_env_vars();
        unsafe {
            env::set_var("REALTIME_URL", "https://api.openai.com/v1/realtime");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "REALTIME_URL"),
            _ => panic!("Expected InvalidValue for REALTIME_URL"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_tool_timeout() {
        for raw in ["soon", "0", "-3"] {
            clear_env_vars();
            unsafe {
                env::set_var("TOOL_TIMEOUT_SECS", raw);
            }

            let err = Config::from_env().unwrap_err();
            match err {
                ConfigError::InvalidValue(var, _) => assert_eq!(var, "TOOL_TIMEOUT_SECS"),
                _ => panic!("Expected InvalidValue for TOOL_TIMEOUT_SECS"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_empty_initial_agent_means_default() {
        clear_env_vars();
        unsafe {
            env::set_var("INITIAL_AGENT", "");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.initial_agent, None);
    }
}
