use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Counter reconciliation interval. `0` disables the background pass.
    pub reconcile_secs: u64,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("AGORA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("AGORA_JWT_SECRET is unset or still a placeholder");
        }

        let port = match lookup("AGORA_PORT") {
            Some(v) => v.parse().with_context(|| format!("invalid AGORA_PORT {v:?}"))?,
            None => 3000,
        };
        let reconcile_secs = match lookup("AGORA_RECONCILE_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid AGORA_RECONCILE_SECS {v:?}"))?,
            None => 3600,
        };
        let cookie_secure = lookup("AGORA_COOKIE_SECURE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            jwt_secret,
            db_path: lookup("AGORA_DB_PATH")
                .unwrap_or_else(|| "agora.db".into())
                .into(),
            host: lookup("AGORA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            reconcile_secs,
            cookie_secure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("AGORA_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.db_path, PathBuf::from("agora.db"));
        assert_eq!(cfg.reconcile_secs, 3600);
        assert!(!cfg.cookie_secure);
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("AGORA_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("AGORA_JWT_SECRET", "s3cret"),
            ("AGORA_PORT", "8080"),
            ("AGORA_RECONCILE_SECS", "0"),
            ("AGORA_COOKIE_SECURE", "true"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.reconcile_secs, 0);
        assert!(cfg.cookie_secure);

        assert!(config(&[("AGORA_JWT_SECRET", "s3cret"), ("AGORA_PORT", "http")]).is_err());
    }
}
