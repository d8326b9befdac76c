use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};

use crate::cms::Document;
use crate::rich_text::RichText;

/// Site-wide settings read from the front matter of `content/home.md`.
#[derive(Deserialize, Debug, Clone)]
pub struct FrontMatter {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub uid: String,
    pub first_publication_date: Option<DateTime<FixedOffset>>,
    pub last_publication_date: Option<DateTime<FixedOffset>>,
    pub data: PostData,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PostData {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subtitle: String,
    #[serde(deserialize_with = "null_as_default")]
    pub banner: Banner,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: Vec<Section>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Banner {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Section {
    #[serde(default, deserialize_with = "null_as_default")]
    pub heading: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: RichText,
}

/// Entry of the home listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSummary {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub first_publication_date: Option<DateTime<FixedOffset>>,
}

impl Post {
    /// Published, then republished with changes.
    pub fn was_edited(&self) -> bool {
        match (self.first_publication_date, self.last_publication_date) {
            (Some(first), Some(last)) => first != last,
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }
}

impl TryFrom<Document> for Post {
    type Error = serde_json::Error;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let data: PostData = if doc.data.is_null() {
            PostData::default()
        } else {
            serde_json::from_value(doc.data)?
        };

        Ok(Self {
            uid: doc.uid.unwrap_or_default(),
            id: doc.id,
            first_publication_date: doc.first_publication_date,
            last_publication_date: doc.last_publication_date,
            data,
        })
    }
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        Self {
            uid: post.uid,
            title: post.data.title,
            subtitle: post.data.subtitle,
            author: post.data.author,
            first_publication_date: post.first_publication_date,
        }
    }
}

/// The CMS sends `null` for empty text fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
