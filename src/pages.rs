//! Static generation of post pages, with on-demand generation for slugs
//! that were not enumerated up front.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::cms::CmsError;
use crate::retrieval::{fetch_post_page, list_post_slugs, PostPage, RetrievalError};
use crate::state::AppState;

/// How long a slug with no document is trusted when no revalidate interval
/// is configured.
const MISSING_RECHECK: Duration = Duration::from_secs(60);
/// Upper bound on remembered slugs without a document; the oldest is evicted.
const MAX_MISSING_PAGES: usize = 512;

#[derive(Debug, Clone)]
pub enum PageEntry {
    /// Generation is in flight.
    Resolving,
    Ready {
        page: Arc<PostPage>,
        generated_at: Instant,
        revalidating: bool,
    },
    /// The CMS had no document for this slug when last checked.
    Missing {
        checked_at: Instant,
        rechecking: bool,
    },
    /// On-demand generation failed; reported once, then retried.
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum PageLookup {
    Ready(Arc<PostPage>),
    Resolving,
    NotFound,
    Failed(String),
}

/// Generates a page for every slug the CMS lists. Returns how many pages are
/// ready.
pub async fn generate_static_pages(state: &AppState) -> Result<usize, CmsError> {
    let slugs = list_post_slugs(state.source.as_ref(), state.doc_type()).await?;
    info!(count = slugs.len(), "Pre-generating post pages...");

    let mut ready = 0;
    for slug in &slugs {
        match generate_page(state, slug).await {
            Ok(true) => ready += 1,
            Ok(false) => {}
            Err(e) => warn!(%slug, "Failed to pre-generate page, deferring to first request: {}", e),
        }
    }
    Ok(ready)
}

/// Fetches `slug` and stores the result. `Ok(false)` means the slug does not
/// exist.
pub async fn generate_page(state: &AppState, slug: &str) -> Result<bool, CmsError> {
    let result = fetch_post_page(state.source.as_ref(), state.doc_type(), slug, None).await;
    let mut pages = state.pages.write().await;
    match result {
        Ok(page) => {
            pages.insert(
                slug.to_string(),
                PageEntry::Ready {
                    page: Arc::new(page),
                    generated_at: Instant::now(),
                    revalidating: false,
                },
            );
            info!(%slug, "page generated");
            Ok(true)
        }
        Err(RetrievalError::NotFound { .. }) => {
            remember_missing(&mut pages, slug);
            info!(%slug, "no document for slug");
            Ok(false)
        }
        Err(RetrievalError::Cms(e)) => Err(e),
    }
}

fn remember_missing(pages: &mut HashMap<String, PageEntry>, slug: &str) {
    let already_missing = matches!(pages.get(slug), Some(PageEntry::Missing { .. }));
    let missing = pages
        .values()
        .filter(|entry| matches!(entry, PageEntry::Missing { .. }))
        .count();

    if !already_missing && missing >= MAX_MISSING_PAGES {
        let oldest = pages
            .iter()
            .filter_map(|(slug, entry)| match entry {
                PageEntry::Missing { checked_at, .. } => Some((*checked_at, slug.clone())),
                _ => None,
            })
            .min_by_key(|(checked_at, _)| *checked_at);
        if let Some((_, oldest)) = oldest {
            debug!(slug = %oldest, "forgetting missing slug");
            pages.remove(&oldest);
        }
    }

    pages.insert(
        slug.to_string(),
        PageEntry::Missing {
            checked_at: Instant::now(),
            rechecking: false,
        },
    );
}

pub async fn lookup(state: &Arc<AppState>, slug: &str) -> PageLookup {
    let revalidate_after = state.settings.server.revalidate_secs.map(Duration::from_secs);
    let mut pages = state.pages.write().await;

    match pages.entry(slug.to_string()) {
        Entry::Vacant(entry) => {
            entry.insert(PageEntry::Resolving);
            spawn_generation(state.clone(), slug.to_string());
            PageLookup::Resolving
        }
        Entry::Occupied(mut entry) => match entry.get().clone() {
            PageEntry::Ready {
                page,
                generated_at,
                revalidating,
            } => {
                let stale = revalidate_after.is_some_and(|after| generated_at.elapsed() >= after);
                if stale && !revalidating {
                    entry.insert(PageEntry::Ready {
                        page: page.clone(),
                        generated_at,
                        revalidating: true,
                    });
                    spawn_generation(state.clone(), slug.to_string());
                }
                PageLookup::Ready(page)
            }
            PageEntry::Resolving => PageLookup::Resolving,
            PageEntry::Missing {
                checked_at,
                rechecking,
            } => {
                let recheck_after = revalidate_after.unwrap_or(MISSING_RECHECK);
                if checked_at.elapsed() >= recheck_after && !rechecking {
                    entry.insert(PageEntry::Missing {
                        checked_at,
                        rechecking: true,
                    });
                    spawn_generation(state.clone(), slug.to_string());
                }
                PageLookup::NotFound
            }
            PageEntry::Failed(reason) => {
                entry.remove();
                PageLookup::Failed(reason)
            }
        },
    }
}

fn spawn_generation(state: Arc<AppState>, slug: String) {
    tokio::spawn(async move {
        if let Err(e) = generate_page(&state, &slug).await {
            error!(%slug, "Failed to generate page: {}", e);
            let mut pages = state.pages.write().await;
            // A stale answer keeps being served until a later attempt succeeds.
            match pages.get_mut(&slug) {
                Some(PageEntry::Ready { revalidating, .. }) => *revalidating = false,
                Some(PageEntry::Missing { rechecking, .. }) => *rechecking = false,
                _ => {
                    pages.insert(slug, PageEntry::Failed(e.to_string()));
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::content_loader::SiteTemplates;
    use crate::test_support::{post_document, InMemorySource};

    fn state_with(source: Arc<InMemorySource>, revalidate_secs: Option<u64>) -> Arc<AppState> {
        let mut settings = Settings::default();
        settings.server.revalidate_secs = revalidate_secs;
        Arc::new(AppState::new(settings, source, SiteTemplates::default()))
    }

    fn documents() -> InMemorySource {
        InMemorySource::new(vec![
            post_document("1", "first", "2021-01-01T10:00:00+0000", "2021-01-01T10:00:00+0000"),
            post_document("2", "second", "2021-02-01T10:00:00+0000", "2021-02-01T10:00:00+0000"),
        ])
    }

    fn source() -> Arc<InMemorySource> {
        Arc::new(documents())
    }

    async fn settle(state: &Arc<AppState>, slug: &str) -> PageLookup {
        for _ in 0..100 {
            match lookup(state, slug).await {
                PageLookup::Resolving => tokio::time::sleep(Duration::from_millis(10)).await,
                other => return other,
            }
        }
        panic!("page {slug} never settled");
    }

    #[tokio::test]
    async fn pre_generated_pages_are_ready_immediately() {
        let state = state_with(source(), None);
        let ready = generate_static_pages(&state).await.expect("generation");
        assert_eq!(ready, 2);

        match lookup(&state, "second").await {
            PageLookup::Ready(page) => {
                assert_eq!(page.post.uid, "second");
                assert_eq!(page.prev_post.as_ref().map(|p| p.uid.as_str()), Some("first"));
            }
            other => panic!("expected ready page, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_slug_resolves_before_it_is_ready() {
        let state = state_with(source(), None);

        assert!(matches!(lookup(&state, "first").await, PageLookup::Resolving));
        assert!(matches!(settle(&state, "first").await, PageLookup::Ready(_)));
    }

    #[tokio::test]
    async fn slug_without_document_becomes_not_found() {
        let state = state_with(source(), None);

        assert!(matches!(lookup(&state, "ghost").await, PageLookup::Resolving));
        assert!(matches!(settle(&state, "ghost").await, PageLookup::NotFound));
    }

    #[tokio::test]
    async fn missing_slug_is_not_refetched_before_recheck_interval() {
        let source = source();
        let state = state_with(source.clone(), None);

        assert!(matches!(settle(&state, "ghost").await, PageLookup::NotFound));
        let before = source.queries().len();

        assert!(matches!(lookup(&state, "ghost").await, PageLookup::NotFound));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(source.queries().len(), before);
    }

    #[tokio::test]
    async fn missing_slug_becomes_ready_once_published() {
        let source = source();
        let state = state_with(source.clone(), Some(0));

        assert!(matches!(settle(&state, "third").await, PageLookup::NotFound));
        source.insert(post_document(
            "3",
            "third",
            "2021-03-01T10:00:00+0000",
            "2021-03-01T10:00:00+0000",
        ));

        for _ in 0..100 {
            if let PageLookup::Ready(page) = lookup(&state, "third").await {
                assert_eq!(page.post.uid, "third");
                assert_eq!(page.prev_post.as_ref().map(|p| p.uid.as_str()), Some("second"));
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("published slug never became ready");
    }

    #[tokio::test]
    async fn missing_slugs_are_capped() {
        let state = state_with(source(), None);

        for i in 0..MAX_MISSING_PAGES + 10 {
            let found = generate_page(&state, &format!("junk-{i}")).await.expect("generation");
            assert!(!found);
        }

        let pages = state.pages.read().await;
        assert_eq!(pages.len(), MAX_MISSING_PAGES);
        assert!(pages.contains_key(&format!("junk-{}", MAX_MISSING_PAGES + 9)));
    }

    #[tokio::test]
    async fn failures_are_reported_once_then_retried() {
        let state = state_with(Arc::new(documents().failing()), None);

        assert!(matches!(lookup(&state, "first").await, PageLookup::Resolving));
        assert!(matches!(settle(&state, "first").await, PageLookup::Failed(_)));
        assert!(matches!(lookup(&state, "first").await, PageLookup::Resolving));
    }

    #[tokio::test]
    async fn stale_pages_are_served_while_regenerating() {
        let source = source();
        let state = state_with(source.clone(), Some(0));
        generate_static_pages(&state).await.expect("generation");
        let before = source.queries().len();

        assert!(matches!(lookup(&state, "first").await, PageLookup::Ready(_)));

        for _ in 0..100 {
            if source.queries().len() >= before + 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(source.queries().len(), before + 3);
        assert!(matches!(lookup(&state, "first").await, PageLookup::Ready(_)));
    }
}
