use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "blog.toml";

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub cms: CmsSettings,
    pub comments: CommentsSettings,
    pub server: ServerSettings,
    #[serde(skip)]
    pub is_development: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CmsSettings {
    pub api_endpoint: String,
    pub access_token: Option<String>,
    pub document_type: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CommentsSettings {
    pub repo: Option<String>,
    pub theme: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Regenerate pre-built pages older than this many seconds.
    pub revalidate_secs: Option<u64>,
    pub home_page_size: u32,
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            access_token: None,
            document_type: "posts".to_string(),
        }
    }
}

impl Default for CommentsSettings {
    fn default() -> Self {
        Self {
            repo: None,
            theme: "github-dark".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            revalidate_secs: None,
            home_page_size: 20,
        }
    }
}

impl Settings {
    /// Reads `BLOG_CONFIG` (or `blog.toml` when present), then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("BLOG_CONFIG").ok();
        let mut settings = match &path {
            Some(path) => Self::from_file(Path::new(path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = var("CMS_API_ENDPOINT") {
            self.cms.api_endpoint = endpoint;
        }
        if let Some(token) = var("CMS_ACCESS_TOKEN") {
            self.cms.access_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(doc_type) = var("CMS_DOCUMENT_TYPE") {
            self.cms.document_type = doc_type;
        }
        if let Some(repo) = var("COMMENTS_REPO") {
            self.comments.repo = Some(repo).filter(|r| !r.is_empty());
        }
        if let Some(theme) = var("COMMENTS_THEME") {
            self.comments.theme = theme;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port
                .parse()
                .context("Failed to parse PORT, expecting integer")?;
        }
        if let Some(secs) = var("REVALIDATE_SECS") {
            self.server.revalidate_secs = Some(
                secs.parse()
                    .context("Failed to parse REVALIDATE_SECS, expecting integer")?,
            );
        }
        if let Some(size) = var("HOME_PAGE_SIZE") {
            self.server.home_page_size = size
                .parse()
                .context("Failed to parse HOME_PAGE_SIZE, expecting integer")?;
        }
        self.is_development = var("RUST_ENV").is_some_and(|v| v == "development");
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cms.api_endpoint.trim().is_empty() {
            return Err(anyhow!("CMS_API_ENDPOINT (or cms.api_endpoint) is required"));
        }
        if self.cms.document_type.trim().is_empty() {
            return Err(anyhow!("cms.document_type must not be empty"));
        }
        if self.server.home_page_size == 0 {
            return Err(anyhow!("HOME_PAGE_SIZE must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_to_an_empty_file() {
        let settings = Settings::from_toml("").expect("settings");
        assert_eq!(settings.cms.document_type, "posts");
        assert_eq!(settings.comments.theme, "github-dark");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.home_page_size, 20);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn reads_toml_sections() {
        let settings = Settings::from_toml(
            r#"
            [cms]
            api_endpoint = "https://spacetraveling.cdn.prismic.io/api/v2"
            document_type = "articles"

            [comments]
            repo = "owner/blog-comments"

            [server]
            revalidate_secs = 1800
            "#,
        )
        .expect("settings");

        assert_eq!(settings.cms.document_type, "articles");
        assert_eq!(settings.comments.repo.as_deref(), Some("owner/blog-comments"));
        assert_eq!(settings.server.revalidate_secs, Some(1800));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut settings = Settings::from_toml(
            r#"
            [cms]
            api_endpoint = "https://file.example/api/v2"
            "#,
        )
        .expect("settings");

        settings
            .apply_env(env(&[
                ("CMS_API_ENDPOINT", "https://env.example/api/v2"),
                ("CMS_ACCESS_TOKEN", ""),
                ("PORT", "3000"),
                ("RUST_ENV", "development"),
            ]))
            .expect("env");

        assert_eq!(settings.cms.api_endpoint, "https://env.example/api/v2");
        assert!(settings.cms.access_token.is_none());
        assert_eq!(settings.server.port, 3000);
        assert!(settings.is_development);
    }

    #[test]
    fn rejects_non_numeric_port() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(env(&[("PORT", "eighty")]))
            .expect_err("bad port");
        assert!(err.to_string().contains("PORT"));
    }
}
