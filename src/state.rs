use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::cms::ContentSource;
use crate::config::Settings;
use crate::content_loader::SiteTemplates;
use crate::pages::PageEntry;
use crate::preview::PreviewRegistry;
use crate::render::{CommentsWidget, RenderOptions};

pub type RefreshBroadcaster = broadcast::Sender<()>;

pub struct AppState {
    pub templates: RwLock<SiteTemplates>,
    /// Pre-generated and on-demand post pages, keyed by slug.
    pub pages: RwLock<HashMap<String, PageEntry>>,
    pub previews: PreviewRegistry,
    pub source: Arc<dyn ContentSource>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings, source: Arc<dyn ContentSource>, templates: SiteTemplates) -> Self {
        Self {
            templates: RwLock::new(templates),
            pages: RwLock::new(HashMap::new()),
            previews: PreviewRegistry::default(),
            source,
            settings,
        }
    }

    pub fn doc_type(&self) -> &str {
        &self.settings.cms.document_type
    }

    pub async fn render_options(&self) -> RenderOptions {
        let site_name = self.templates.read().await.site.title.clone();
        let comments = self.settings.comments.repo.as_ref().map(|repo| CommentsWidget {
            repo: repo.clone(),
            theme: self.settings.comments.theme.clone(),
        });
        RenderOptions {
            site_name,
            comments,
        }
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
