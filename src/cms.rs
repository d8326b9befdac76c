//! Read-only access to a Prismic-compatible content API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("cms http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cms responded with {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("failed to decode cms document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cms api did not advertise a master ref")]
    MissingMasterRef,
}

pub type CmsResult<T> = Result<T, CmsError>;

/// A document as returned by the search endpoint. `data` stays untyped until
/// the page decides which fields it needs.
#[derive(Deserialize, Debug, Clone)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub first_publication_date: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub last_publication_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SearchPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub results: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    At { path: String, value: String },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::At {
            path: path.into(),
            value: value.into(),
        }
    }

    fn render(&self) -> String {
        match self {
            Predicate::At { path, value } => {
                // serde_json quotes and escapes the value for us.
                let quoted = serde_json::Value::String(value.clone()).to_string();
                format!("[at({path}, {quoted})]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

impl Ordering {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    fn render(&self) -> String {
        match self.direction {
            Direction::Asc => format!("[{}]", self.field),
            Direction::Desc => format!("[{} desc]", self.field),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub predicates: Vec<Predicate>,
    pub ordering: Option<Ordering>,
    pub page_size: Option<u32>,
    pub page: Option<u32>,
    /// Only return documents positioned after this document id.
    pub after: Option<String>,
    /// Revision to read from; the master ref when absent.
    pub reference: Option<String>,
}

impl Query {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicates: vec![predicate],
            ..Self::default()
        }
    }

    pub fn ordered(mut self, ordering: Ordering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn after(mut self, document_id: impl Into<String>) -> Self {
        self.after = Some(document_id.into());
        self
    }

    pub fn reference(mut self, reference: Option<&str>) -> Self {
        self.reference = reference.map(str::to_string);
        self
    }

    fn q(&self) -> String {
        let predicates: String = self.predicates.iter().map(Predicate::render).collect();
        format!("[{predicates}]")
    }
}

/// Anything that can answer document searches.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn search(&self, query: &Query) -> CmsResult<SearchPage>;

    /// The revision searches read when a query names none. Sources without
    /// revisions return `None`.
    async fn current_ref(&self) -> CmsResult<Option<String>> {
        Ok(None)
    }

    async fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        reference: Option<&str>,
    ) -> CmsResult<Option<Document>> {
        let query = Query::new(Predicate::at(format!("my.{doc_type}.uid"), uid))
            .page_size(1)
            .reference(reference);
        Ok(self.search(&query).await?.results.into_iter().next())
    }

    async fn get_by_id(&self, id: &str, reference: Option<&str>) -> CmsResult<Option<Document>> {
        let query = Query::new(Predicate::at("document.id", id))
            .page_size(1)
            .reference(reference);
        Ok(self.search(&query).await?.results.into_iter().next())
    }
}

#[derive(Deserialize, Debug)]
struct ApiRoot {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Deserialize, Debug)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default, rename = "isMasterRef")]
    is_master_ref: bool,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PrismicClient {
    endpoint: String,
    access_token: Option<String>,
    client: Client,
}

impl PrismicClient {
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>) -> CmsResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token,
            client,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/documents/search", self.endpoint)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> CmsResult<T> {
        let mut request = self.client.get(url).query(params);
        if let Some(token) = &self.access_token {
            request = request.query(&[("access_token", token)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body
                    .message
                    .or(body.error)
                    .unwrap_or_else(|| format!("http status {status}")),
                Err(_) => format!("http status {status}"),
            };
            return Err(CmsError::Status { status, message });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn master_ref(&self) -> CmsResult<String> {
        let root: ApiRoot = self.get_json(&self.endpoint, &[]).await?;
        root.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(CmsError::MissingMasterRef)
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn current_ref(&self) -> CmsResult<Option<String>> {
        self.master_ref().await.map(Some)
    }

    async fn search(&self, query: &Query) -> CmsResult<SearchPage> {
        let reference = match &query.reference {
            Some(reference) => reference.clone(),
            None => self.master_ref().await?,
        };

        let mut params = vec![("ref", reference), ("q", query.q())];
        if let Some(ordering) = &query.ordering {
            params.push(("orderings", ordering.render()));
        }
        if let Some(page_size) = query.page_size {
            params.push(("pageSize", page_size.to_string()));
        }
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        if let Some(after) = &query.after {
            params.push(("after", after.clone()));
        }

        debug!(q = %query.q(), "cms search");
        self.get_json(&self.search_url(), &params).await
    }
}

/// Parses CMS timestamps such as `2021-03-25T19:25:28+0000`; RFC 3339 is
/// accepted as well.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z").or_else(|_| DateTime::parse_from_rfc3339(raw))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(de::Error::custom))
        .transpose()
}
