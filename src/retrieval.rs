//! Fetches everything a post page or the home listing needs from the CMS.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::cms::{CmsError, ContentSource, Ordering, Predicate, Query};
use crate::models::{Post, PostSummary};

const LAST_PUBLICATION: &str = "document.last_publication_date";
const FIRST_PUBLICATION: &str = "document.first_publication_date";
const SLUG_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("no document with slug `{slug}`")]
    NotFound { slug: String },

    #[error(transparent)]
    Cms(#[from] CmsError),
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        RetrievalError::Cms(CmsError::Decode(err))
    }
}

/// Everything the post page renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPage {
    pub post: Post,
    pub preview_ref: Option<String>,
    pub prev_post: Option<Post>,
    pub next_post: Option<Post>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HomePage {
    pub posts: Vec<PostSummary>,
    pub page: u32,
    pub next_page: Option<u32>,
}

#[instrument(skip(source, preview_ref))]
pub async fn fetch_post_page(
    source: &dyn ContentSource,
    doc_type: &str,
    slug: &str,
    preview_ref: Option<&str>,
) -> Result<PostPage, RetrievalError> {
    let reference = pinned_ref(source, preview_ref).await?;
    let reference = reference.as_deref();

    let document = source
        .get_by_uid(doc_type, slug, reference)
        .await?
        .ok_or_else(|| RetrievalError::NotFound {
            slug: slug.to_string(),
        })?;
    let post = Post::try_from(document)?;

    let (prev_post, next_post) = futures::future::try_join(
        neighbor(source, doc_type, &post.id, reference, Ordering::desc(LAST_PUBLICATION)),
        neighbor(source, doc_type, &post.id, reference, Ordering::asc(LAST_PUBLICATION)),
    )
    .await?;

    debug!(
        id = %post.id,
        prev = prev_post.as_ref().map(|p| p.uid.as_str()),
        next = next_post.as_ref().map(|p| p.uid.as_str()),
        "post page retrieved"
    );

    Ok(PostPage {
        post,
        preview_ref: preview_ref.map(str::to_string),
        prev_post,
        next_post,
    })
}

/// The ref every query of one retrieval reads, so the document and its
/// neighbours come from the same revision.
async fn pinned_ref(
    source: &dyn ContentSource,
    preview_ref: Option<&str>,
) -> Result<Option<String>, CmsError> {
    match preview_ref {
        Some(reference) => Ok(Some(reference.to_string())),
        None => source.current_ref().await,
    }
}

async fn neighbor(
    source: &dyn ContentSource,
    doc_type: &str,
    id: &str,
    preview_ref: Option<&str>,
    ordering: Ordering,
) -> Result<Option<Post>, RetrievalError> {
    let query = Query::new(Predicate::at("document.type", doc_type))
        .ordered(ordering)
        .page_size(1)
        .after(id)
        .reference(preview_ref);

    match source.search(&query).await?.results.into_iter().next() {
        Some(document) => Ok(Some(Post::try_from(document)?)),
        None => Ok(None),
    }
}

/// Every slug of `doc_type`, for pre-generating pages.
pub async fn list_post_slugs(
    source: &dyn ContentSource,
    doc_type: &str,
) -> Result<Vec<String>, CmsError> {
    let reference = source.current_ref().await?;
    let mut slugs = Vec::new();
    let mut page = 1;

    loop {
        let query = Query::new(Predicate::at("document.type", doc_type))
            .page_size(SLUG_PAGE_SIZE)
            .page(page)
            .reference(reference.as_deref());
        let results = source.search(&query).await?;

        slugs.extend(results.results.into_iter().filter_map(|doc| doc.uid));

        if results.next_page.is_none() || page >= results.total_pages {
            break;
        }
        page += 1;
    }

    Ok(slugs)
}

pub async fn fetch_home_page(
    source: &dyn ContentSource,
    doc_type: &str,
    page: u32,
    page_size: u32,
) -> Result<HomePage, RetrievalError> {
    let page = page.max(1);
    let query = Query::new(Predicate::at("document.type", doc_type))
        .ordered(Ordering::desc(FIRST_PUBLICATION))
        .page_size(page_size)
        .page(page);
    let results = source.search(&query).await?;

    let next_page = results.next_page.as_ref().map(|_| page + 1);
    let posts = results
        .results
        .into_iter()
        .map(|doc| Post::try_from(doc).map(PostSummary::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HomePage {
        posts,
        page,
        next_page,
    })
}

/// Slug of the document a preview session was opened for.
pub async fn resolve_preview_document(
    source: &dyn ContentSource,
    document_id: &str,
    reference: &str,
) -> Result<Option<String>, CmsError> {
    Ok(source
        .get_by_id(document_id, Some(reference))
        .await?
        .and_then(|doc| doc.uid))
}
