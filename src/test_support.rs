//! In-memory content source shared by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::cms::{
    CmsError, CmsResult, ContentSource, Direction, Document, Predicate, Query, SearchPage,
};

const DEFAULT_PAGE_SIZE: u32 = 20;

pub fn post_document(id: &str, uid: &str, first: &str, last: &str) -> Document {
    serde_json::from_value(json!({
        "id": id,
        "uid": uid,
        "type": "posts",
        "first_publication_date": first,
        "last_publication_date": last,
        "data": {
            "title": format!("Post {uid}"),
            "subtitle": format!("About {uid}"),
            "author": "Joseph Oliveira",
            "banner": { "url": format!("https://images.example/{uid}.png") },
            "content": [
                {
                    "heading": "Introduction",
                    "body": [{ "type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": [] }]
                },
                {
                    "heading": "Conclusion",
                    "body": [{ "type": "paragraph", "text": "Fin", "spans": [] }]
                }
            ]
        }
    }))
    .expect("valid test document")
}

pub struct InMemorySource {
    documents: Mutex<Vec<Document>>,
    queries: Mutex<Vec<Query>>,
    failing: bool,
}

impl InMemorySource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
            queries: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Publishes another document.
    pub fn insert(&self, document: Document) {
        self.documents.lock().expect("documents lock").push(document);
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().expect("queries lock").clone()
    }

    fn matches(doc: &Document, predicate: &Predicate) -> bool {
        let Predicate::At { path, value } = predicate;
        match path.as_str() {
            "document.type" => &doc.doc_type == value,
            "document.id" => &doc.id == value,
            other => match other.strip_prefix("my.").and_then(|p| p.strip_suffix(".uid")) {
                Some(doc_type) => doc.doc_type == doc_type && doc.uid.as_deref() == Some(value),
                None => false,
            },
        }
    }
}

#[async_trait]
impl ContentSource for InMemorySource {
    async fn search(&self, query: &Query) -> CmsResult<SearchPage> {
        self.queries.lock().expect("queries lock").push(query.clone());

        if self.failing {
            return Err(CmsError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                message: "cms unavailable".to_string(),
            });
        }

        let mut docs: Vec<Document> = self
            .documents
            .lock()
            .expect("documents lock")
            .iter()
            .filter(|doc| query.predicates.iter().all(|p| Self::matches(doc, p)))
            .cloned()
            .collect();

        if let Some(ordering) = &query.ordering {
            docs.sort_by_key(|doc| match ordering.field.as_str() {
                "document.first_publication_date" => doc.first_publication_date,
                _ => doc.last_publication_date,
            });
            if ordering.direction == Direction::Desc {
                docs.reverse();
            }
        }

        if let Some(after) = &query.after {
            if let Some(pos) = docs.iter().position(|doc| &doc.id == after) {
                docs.drain(..=pos);
            }
        }

        let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1) as usize;
        let page = query.page.unwrap_or(1).max(1) as usize;
        let total_pages = docs.len().div_ceil(page_size);
        let results = docs
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        Ok(SearchPage {
            page: page as u32,
            total_pages: total_pages as u32,
            next_page: (page < total_pages).then(|| format!("memory://page/{}", page + 1)),
            results,
        })
    }
}
