use std::path::PathBuf;
use std::str::FromStr;

use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Backend {
    #[display("local")]
    Local,
    #[display("remote")]
    Remote,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "remote" => Ok(Backend::Remote),
            other => Err(anyhow::anyhow!("invalid backend: {other} (expected local or remote)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: Backend,
    pub storage_dir: PathBuf,
    pub storage_key: String,
    pub collection: String,
    pub default_author: String,
    pub default_commenter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            storage_dir: PathBuf::from(".news"),
            storage_key: "fictional-news-articles".into(),
            collection: "articles".into(),
            default_author: "Anonymous Reporter".into(),
            default_commenter: "Anonymous".into(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match var("NEWS_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };
        let storage_dir = var("NEWS_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);
        let storage_key = var("NEWS_STORAGE_KEY").unwrap_or(defaults.storage_key);
        let collection = var("NEWS_COLLECTION").unwrap_or(defaults.collection);
        let default_author = var("NEWS_DEFAULT_AUTHOR").unwrap_or(defaults.default_author);
        let default_commenter =
            var("NEWS_DEFAULT_COMMENTER").unwrap_or(defaults.default_commenter);

        Ok(Self {
            backend,
            storage_dir,
            storage_key,
            collection,
            default_author,
            default_commenter,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.storage_key, "fictional-news-articles");
        assert_eq!(config.collection, "articles");
        assert_eq!(config.default_author, "Anonymous Reporter");
    }

    #[test]
    fn reads_overrides_and_ignores_blank_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("NEWS_BACKEND", "Remote"),
            ("NEWS_STORAGE_DIR", "/tmp/news"),
            ("NEWS_DEFAULT_COMMENTER", "   "),
        ]))
        .unwrap();
        assert_eq!(config.backend, Backend::Remote);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/news"));
        assert_eq!(config.default_commenter, "Anonymous");
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(AppConfig::from_lookup(lookup(&[("NEWS_BACKEND", "cloud")])).is_err());
    }
}
