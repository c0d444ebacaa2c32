use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Page size used when the client does not send `size`
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    /// Upper bound for the `size` query parameter
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8002".to_string()
}

fn default_database_url() -> String {
    "sqlite:news_stash.db?mode=rwc".to_string()
}

fn default_page_size() -> i64 {
    10
}

fn default_max_page_size() -> i64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: default_bind_addr(),
            database_url: default_database_url(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from a file, falling back to defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8002");
        assert_eq!(config.database_url, "sqlite:news_stash.db?mode=rwc");
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            bind_addr = "127.0.0.1:9000"
            database_url = "sqlite:/tmp/content.db?mode=rwc"
            default_page_size = 20
            max_page_size = 50
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.database_url, "sqlite:/tmp/content.db?mode=rwc");
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 50);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let content = r#"bind_addr = "0.0.0.0:8080""#;

        let config = Config::from_str(content).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.database_url, "sqlite:news_stash.db?mode=rwc");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_load_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }
}
