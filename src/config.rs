//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILFILE_CONFIG` (environment variable)
//! 2. `~/.config/mailfile/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailfile\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Decoder behavior.
    pub decode: DecodeConfig,
    /// Password heuristic settings.
    pub passwords: PasswordConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Settings shared by both decode paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Maximum multipart / nested-message depth before a node is kept as a
    /// raw leaf.
    pub max_depth: usize,
    /// Populate an absent Body with a text rendering of the Html body.
    pub html_body_fallback: bool,
    /// Convert undeclared GBK text bodies to UTF-8.
    pub repair_legacy_charset: bool,
}

/// Password heuristic settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Run the extractor after decoding.
    pub enabled: bool,
    /// Keywords that introduce a password-like token.
    pub keywords: Vec<String>,
    /// Markers that, directly after a keyword, discard the hit.
    pub exclusions: Vec<String>,
    /// Tokens must be strictly longer than this many characters.
    pub min_length: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            html_body_fallback: true,
            repair_legacy_charset: true,
        }
    }
}

/// Keywords scanned for by default.
pub const DEFAULT_PASSWORD_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "passcode",
    "pwd",
    "contraseña",
    "mot de passe",
    "passwort",
    "senha",
    "пароль",
    "密码",
    "密碼",
    "口令",
    "解压码",
    "提取码",
    "パスワード",
    "비밀번호",
];

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords: DEFAULT_PASSWORD_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            exclusions: vec!["路径".to_string()],
            min_length: 3,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILFILE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailfile").join("config.toml"))
}

/// Return the cache directory used for the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailfile")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailfile.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.decode.max_depth, 64);
        assert!(cfg.decode.html_body_fallback);
        assert!(cfg.passwords.enabled);
        assert!(cfg.passwords.keywords.iter().any(|k| k == "password"));
        assert_eq!(cfg.passwords.exclusions, vec!["路径".to_string()]);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.decode, cfg.decode);
        assert_eq!(parsed.passwords, cfg.passwords);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[decode]
max_depth = 8

[passwords]
keywords = ["code"]
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.decode.max_depth, 8);
        assert!(cfg.decode.repair_legacy_charset);
        assert_eq!(cfg.passwords.keywords, vec!["code".to_string()]);
        assert_eq!(cfg.passwords.min_length, 3);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_log_file_under_cache_override() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/mailfile-test"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/tmp/mailfile-test/mailfile.log")
        );
    }
}
