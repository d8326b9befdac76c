use std::path::Path;

use anyhow::{anyhow, Context, Result};
use gray_matter::{engine::YAML, Matter};
use pulldown_cmark::{html, Options, Parser};
use tokio::fs;
use tracing::{error, info};

use crate::models::FrontMatter;
use crate::state::AppState;

pub const CONTENT_DIR: &str = "content";

/// Local templates wrapped around the pages rendered from CMS data.
#[derive(Debug, Clone, Default)]
pub struct SiteTemplates {
    pub banner_html: String,
    pub layout_html: String,
    /// Supports a `{{slug}}` placeholder.
    pub not_found_html: String,
    pub home_intro_html: String,
    pub site: FrontMatter,
}

pub async fn load_templates(dir: &Path) -> Result<SiteTemplates> {
    let banner_html = read(dir, "banner.html").await?;
    let layout_html = read(dir, "layout.html").await?;
    let not_found_html = read(dir, "not_found.html").await?;
    let home_md = read(dir, "home.md").await?;

    let (site, home_intro_html) = parse_home(&home_md)?;

    Ok(SiteTemplates {
        banner_html,
        layout_html,
        not_found_html,
        home_intro_html,
        site,
    })
}

async fn read(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Splits `home.md` into its front matter and the rendered Markdown body.
fn parse_home(source: &str) -> Result<(FrontMatter, String)> {
    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(source)
        .map_err(|e| anyhow!("Failed to parse home.md front matter: {e}"))?;

    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(&parsed.content, options);
    let mut intro_html = String::new();
    html::push_html(&mut intro_html, parser);

    Ok((parsed.data.unwrap_or_default(), intro_html))
}

pub async fn reload_templates(app_state: &AppState) {
    info!("Reloading site templates...");
    match load_templates(Path::new(CONTENT_DIR)).await {
        Ok(templates) => {
            *app_state.templates.write().await = templates;
            info!("Templates successfully reloaded.");
        }
        Err(e) => {
            error!("Failed to reload templates: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_front_matter_names_the_site() {
        let (site, intro) = parse_home(
            "---\ntitle: spacetraveling\ndescription: A blog about space\n---\nWelcome *aboard*.\n",
        )
        .expect("home");

        assert_eq!(site.title, "spacetraveling");
        assert_eq!(site.description, "A blog about space");
        assert_eq!(intro.trim(), "<p>Welcome <em>aboard</em>.</p>");
    }

    #[test]
    fn home_without_front_matter_uses_defaults() {
        let (site, intro) = parse_home("Just text").expect("home");
        assert_eq!(site.title, "spacetraveling");
        assert_eq!(intro.trim(), "<p>Just text</p>");
    }

    #[tokio::test]
    async fn loads_bundled_templates() {
        let templates = load_templates(Path::new(CONTENT_DIR)).await.expect("templates");
        assert!(templates.layout_html.contains("{{ content }}"));
        assert!(templates.not_found_html.contains("{{slug}}"));
    }
}
