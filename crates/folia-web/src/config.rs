use std::net::SocketAddr;
use std::path::PathBuf;

use folia_core::LibraryConfig;
use serde::Deserialize;

/// Server settings, read from the TOML file named by `FOLIA_WEB_CONFIG`.
///
/// ```toml
/// bind_addr = "127.0.0.1:9090"
///
/// [library]
/// root = "~/notes"
///
/// [auth]
/// password_hash = "$argon2id$..."
/// jwt_secret = "..."
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibrarySection {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default)]
    pub password_hash: String,
    #[serde(default = "default_jwt_ttl_hours")]
    pub jwt_ttl_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_login_rpm")]
    pub login_requests_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            password_hash: String::new(),
            jwt_ttl_hours: default_jwt_ttl_hours(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { login_requests_per_minute: default_login_rpm() }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_mb: default_max_body_mb(),
            library: LibrarySection::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    ([0, 0, 0, 0], 9090).into()
}

fn default_max_body_mb() -> usize { 4 }
fn default_jwt_ttl_hours() -> u64 { 24 }
fn default_login_rpm() -> u32 { 5 }

const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "secret",
    "password",
    "jwt-secret",
];

impl ServerConfig {
    /// Returns `true` if a password is configured; otherwise every caller is
    /// treated as signed in.
    pub fn has_auth(&self) -> bool {
        !self.auth.password_hash.is_empty()
    }

    /// The validated library configuration.
    pub fn library_config(&self) -> anyhow::Result<LibraryConfig> {
        let root = self.library.root.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "No library root configured. Set [library] root in the config file or FOLIA_LIBRARY_ROOT."
            )
        })?;
        Ok(LibraryConfig::new(root).validated()?)
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads the config file and applies overrides looked up through `env`.
    fn load_with(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = match env("FOLIA_WEB_CONFIG").map(PathBuf::from) {
            Some(path) => {
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to read config {}: {e}", path.display())
                })?;
                toml::from_str(&contents)?
            }
            None => ServerConfig::default(),
        };

        if let Some(root) = env("FOLIA_LIBRARY_ROOT") {
            config.library.root = Some(PathBuf::from(root));
        }
        if let Some(addr) = env("FOLIA_BIND_ADDR") {
            config.bind_addr = addr.parse()?;
        }
        if let Some(hash) = env("FOLIA_PASSWORD_HASH") {
            config.auth.password_hash = hash;
        }
        if let Some(secret) = env("FOLIA_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if config.auth.jwt_secret.is_empty() {
            config.auth.jwt_secret = uuid::Uuid::new_v4().to_string();
            tracing::warn!(
                "No JWT secret configured. Generated random secret (will change on restart)."
            );
        }

        if config.has_auth() {
            if WEAK_SECRETS.contains(&config.auth.jwt_secret.as_str()) {
                anyhow::bail!(
                    "JWT secret matches a known weak/placeholder value. \
                     Set a strong random secret via FOLIA_JWT_SECRET."
                );
            }
            if config.auth.jwt_secret.len() < 32 {
                tracing::warn!(
                    "JWT secret is shorter than 32 characters. \
                     Consider using a stronger secret via FOLIA_JWT_SECRET."
                );
            }
        }

        // Without a password the library is open, so keep it off the network.
        if !config.has_auth() && !config.bind_addr.ip().is_loopback() {
            let safe_addr: SocketAddr = ([127, 0, 0, 1], config.bind_addr.port()).into();
            tracing::warn!(
                "No password configured. Binding to {} instead of {}.",
                safe_addr,
                config.bind_addr
            );
            config.bind_addr = safe_addr;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn reads_file_and_applies_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("folia-web.toml");
        std::fs::write(
            &path,
            "bind_addr = \"0.0.0.0:8080\"\n\
             [library]\nroot = \"/srv/notes\"\n\
             [auth]\npassword_hash = \"$argon2id$stub\"\n\
             jwt_secret = \"0123456789abcdef0123456789abcdef\"\n",
        )
        .unwrap();
        let path = path.to_string_lossy().into_owned();

        let config = ServerConfig::load_with(env_of(&[
            ("FOLIA_WEB_CONFIG", path.as_str()),
            ("FOLIA_LIBRARY_ROOT", "/data/library"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.library.root, Some(PathBuf::from("/data/library")));
        assert!(config.has_auth());
        assert_eq!(config.auth.jwt_ttl_hours, 24);
    }

    #[test]
    fn open_server_binds_to_loopback() {
        let config = ServerConfig::load_with(env_of(&[("FOLIA_LIBRARY_ROOT", "/notes")])).unwrap();
        assert!(!config.has_auth());
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.bind_addr.port(), 9090);
        assert!(!config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn weak_secret_is_rejected_with_auth() {
        let result = ServerConfig::load_with(env_of(&[
            ("FOLIA_PASSWORD_HASH", "$argon2id$stub"),
            ("FOLIA_JWT_SECRET", "secret"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn missing_root_fails_library_config() {
        let config = ServerConfig::load_with(env_of(&[])).unwrap();
        assert!(config.library_config().is_err());

        let config = ServerConfig::load_with(env_of(&[("FOLIA_LIBRARY_ROOT", "/notes")])).unwrap();
        assert_eq!(config.library_config().unwrap().root, PathBuf::from("/notes"));
    }
}
