//! Preview sessions: the cookie carrying the CMS preview ref and the registry
//! of which document each open session is looking at.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use tokio::sync::RwLock;
use tracing::info;

pub const PREVIEW_COOKIE: &str = "preview_ref";

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    active: RwLock<HashMap<String, String>>,
}

impl PreviewRegistry {
    /// Records that the session `reference` resolved to `document_id`.
    /// Returns `true` when this changed the session's document.
    pub async fn sync(&self, reference: &str, document_id: &str) -> bool {
        let mut active = self.active.write().await;
        let previous = active.insert(reference.to_string(), document_id.to_string());
        let changed = previous.as_deref() != Some(document_id);
        if changed {
            info!(document_id, "preview session synchronized");
        }
        changed
    }

    pub async fn active_document(&self, reference: &str) -> Option<String> {
        self.active.read().await.get(reference).cloned()
    }

    pub async fn end(&self, reference: &str) -> Option<String> {
        self.active.write().await.remove(reference)
    }
}

/// Preview ref from the request cookies, if a session is open.
pub fn preview_ref(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == PREVIEW_COOKIE)
        .map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
        .filter(|value| !value.is_empty())
}

pub fn preview_cookie(reference: &str) -> String {
    format!(
        "{PREVIEW_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        utf8_percent_encode(reference, NON_ALPHANUMERIC)
    )
}

pub fn expired_preview_cookie() -> String {
    format!("{PREVIEW_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_round_trips_refs_with_separators() {
        let reference = "https://spacetraveling.prismic.io/previews/YF; x=1";
        let cookie = preview_cookie(reference);
        let value = cookie.split(';').next().expect("pair");

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {value}")).expect("header"),
        );
        assert_eq!(preview_ref(&headers).as_deref(), Some(reference));
    }

    #[test]
    fn no_cookie_means_no_preview() {
        let mut headers = HeaderMap::new();
        assert!(preview_ref(&headers).is_none());

        headers.insert(header::COOKIE, HeaderValue::from_static("preview_ref="));
        assert!(preview_ref(&headers).is_none());
    }

    #[tokio::test]
    async fn sync_reports_changes_once() {
        let registry = PreviewRegistry::default();
        assert!(registry.sync("ref-1", "doc-a").await);
        assert!(!registry.sync("ref-1", "doc-a").await);
        assert!(registry.sync("ref-1", "doc-b").await);
        assert_eq!(registry.active_document("ref-1").await.as_deref(), Some("doc-b"));

        assert_eq!(registry.end("ref-1").await.as_deref(), Some("doc-b"));
        assert!(registry.active_document("ref-1").await.is_none());
    }
}
