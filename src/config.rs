//! Runtime configuration, resolved once at startup.
//!
//! Handlers never read process environment variables; the server is built
//! from an [`AppConfig`] so tests can construct one directly.
//!
//! # Environment Variables
//! - `GEMINI_API_KEY`: required, startup fails without it
//! - `GEMINI_MODEL`: model id (default: "gemini-1.5-flash")
//! - `GEMINI_API_BASE`: API base URL (default: the public v1beta endpoint)
//! - `AGROPULSE_ADDR`: bind address (default: "0.0.0.0:3000")
//! - `AGROPULSE_TIMEOUT_SECS`: inference timeout (default: 60)
//! - `AGROPULSE_VARIANT`: default analysis variant (default: "numbered-cures")
//! - `AGROPULSE_MAX_UPLOAD_MB`: upload body limit (default: 10)

use crate::error::ConfigError;
use crate::prompts::Variant;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Configuration for the diagnosis service.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL without trailing slash; `/models/{model}:generateContent`
    /// is appended per request.
    pub api_base: String,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    pub default_variant: Variant,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_variant: Variant::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }

    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing {
            name: "GEMINI_API_KEY",
        })?;
        let mut cfg = Self::new(api_key.trim());

        if let Some(model) = get("GEMINI_MODEL") {
            cfg.model = model.trim().to_string();
        }
        if let Some(base) = get("GEMINI_API_BASE") {
            cfg.api_base = base.trim().trim_end_matches('/').to_string();
        }

        let addr = get("AGROPULSE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        cfg.bind_addr = addr.trim().parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: "AGROPULSE_ADDR",
                value: addr.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some(secs) = get("AGROPULSE_TIMEOUT_SECS") {
            let parsed = parse_positive("AGROPULSE_TIMEOUT_SECS", &secs)?;
            cfg.request_timeout = Duration::from_secs(parsed as u64);
        }
        if let Some(variant) = get("AGROPULSE_VARIANT") {
            cfg.default_variant =
                variant
                    .parse()
                    .map_err(|reason| ConfigError::Invalid {
                        name: "AGROPULSE_VARIANT",
                        value: variant.clone(),
                        reason,
                    })?;
        }
        if let Some(mb) = get("AGROPULSE_MAX_UPLOAD_MB") {
            cfg.max_upload_bytes = parse_positive("AGROPULSE_MAX_UPLOAD_MB", &mb)? * 1024 * 1024;
        }

        Ok(cfg)
    }

    /// Full `generateContent` URL including the key query parameter.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        )
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

// The key must never end up in logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("bind_addr", &self.bind_addr)
            .field("request_timeout", &self.request_timeout)
            .field("default_variant", &self.default_variant)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "GEMINI_API_KEY" }));

        let err = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.bind_addr.port(), 3000);
        assert_eq!(cfg.request_timeout, Duration::from_secs(60));
        assert_eq!(cfg.default_variant, Variant::NumberedCures);
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn overrides_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "gemini-2.5-flash"),
            ("GEMINI_API_BASE", "http://127.0.0.1:9999/v1beta/"),
            ("AGROPULSE_ADDR", "127.0.0.1:8080"),
            ("AGROPULSE_TIMEOUT_SECS", "5"),
            ("AGROPULSE_VARIANT", "top-diseases"),
            ("AGROPULSE_MAX_UPLOAD_MB", "2"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.generate_url(),
            "http://127.0.0.1:9999/v1beta/models/gemini-2.5-flash:generateContent?key=k"
        );
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.default_variant, Variant::TopDiseases);
        assert_eq!(cfg.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("AGROPULSE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AGROPULSE_TIMEOUT_SECS", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("AGROPULSE_ADDR", "not-an-addr"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AGROPULSE_ADDR", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("AGROPULSE_VARIANT", "top5"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("top5"));
    }

    #[test]
    fn debug_redacts_key() {
        let cfg = AppConfig::new("super-secret");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
