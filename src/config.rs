use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://skill-tracker.db?mode=rwc";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub database_url: String,
    pub timeout: Option<Duration>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_url = lookup("SKILL_TRACKER_API_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let timeout = match lookup("SKILL_TRACKER_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("SKILL_TRACKER_TIMEOUT_SECS must be whole seconds, got '{raw}'"))?;
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            database_url,
            timeout,
        })
    }

    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.api_url = url.trim_end_matches('/').to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("SKILL_TRACKER_API_URL", "https://api.example.com/"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("SKILL_TRACKER_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();
        assert_eq!(settings.api_url, "https://api.example.com");
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let result = Settings::from_lookup(lookup_from(&[("SKILL_TRACKER_TIMEOUT_SECS", "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn flag_overrides_environment() {
        let settings = Settings::from_lookup(lookup_from(&[]))
            .unwrap()
            .with_api_url(Some("http://10.0.0.5:9000/".to_string()));
        assert_eq!(settings.api_url, "http://10.0.0.5:9000");
    }
}
