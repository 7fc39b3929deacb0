use std::net::SocketAddr;
use std::path::PathBuf;

use cmsfs_core::Config;
use serde::Deserialize;

/// Server settings. The core `[files]`, `[sync]` and `[mime]` tables live at
/// the top level of the same TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,
    #[serde(flatten)]
    pub core: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_size_mb: default_max_body_size_mb(),
            core: Config::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_max_body_size_mb() -> usize {
    16
}

impl ServerConfig {
    /// Reads `CMSFS_WEB_CONFIG` (if set) and applies `CMSFS_*` overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CMSFS_WEB_CONFIG") {
            Ok(path) => {
                let contents = std::fs::read_to_string(PathBuf::from(&path))?;
                Self::parse(&contents)?
            }
            Err(_) => ServerConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies environment-style overrides read through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(root) = var("CMSFS_ROOT") {
            self.core.files.root_dir = PathBuf::from(root);
        }
        if let Some(addr) = var("CMSFS_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Some(val) = var("CMSFS_MAX_BODY_SIZE_MB") {
            if let Ok(mb) = val.parse::<usize>() {
                self.max_body_size_mb = mb;
            }
        }
        if let Some(val) = var("CMSFS_SYNC") {
            self.core.sync.enabled = !matches!(val.as_str(), "0" | "false" | "off");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_reads_server_and_core_tables() {
        let config = ServerConfig::parse(
            r#"
bind_addr = "0.0.0.0:8080"

[files]
root_dir = "/srv/site"
upload_path = "media"

[sync]
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.max_body_size_mb, 16);
        assert_eq!(config.core.files.root_dir, PathBuf::from("/srv/site"));
        assert_eq!(config.core.files.upload_path, "media");
        assert!(!config.core.sync.enabled);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.bind_addr, default_bind_addr());
        assert_eq!(config.core.files.temp_dir, "system/tmp");
    }

    #[test]
    fn overrides_replace_values() {
        let env: HashMap<&str, &str> = [
            ("CMSFS_ROOT", "/var/www"),
            ("CMSFS_BIND_ADDR", "127.0.0.1:3000"),
            ("CMSFS_MAX_BODY_SIZE_MB", "2"),
            ("CMSFS_SYNC", "off"),
        ]
        .into_iter()
        .collect();
        let mut config = ServerConfig::default();

        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.core.files.root_dir, PathBuf::from("/var/www"));
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.max_body_size_mb, 2);
        assert!(!config.core.sync.enabled);
    }

    #[test]
    fn invalid_bind_addr_is_an_error() {
        let mut config = ServerConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "CMSFS_BIND_ADDR").then(|| "not an address".to_string())
        });
        assert!(result.is_err());
    }
}
