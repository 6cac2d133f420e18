//! Post submission rules checked locally before a write reaches the CMS.

use serde::Deserialize;
use serde_json::{Map, Value};
use slug::slugify;
use time::OffsetDateTime;

use super::content::Content;
use super::error::DomainError;
use super::types::PostStatus;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_EXCERPT_CHARS: usize = 500;

/// Post fields as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostDraft {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<Content>,
    pub cover_image: Option<String>,
    pub status: Option<String>,
    pub featured: bool,
    pub category: Option<Value>,
}

/// A draft that passed the local shape check.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: Option<Content>,
    pub cover_image: Option<String>,
    pub status: PostStatus,
    pub featured: bool,
    pub category: Option<Value>,
    pub published_at: Option<OffsetDateTime>,
}

impl PostDraft {
    /// Validate the draft, deriving the slug from the title when absent.
    ///
    /// Published drafts are stamped with `now` as their publication time.
    pub fn validate(self, now: OffsetDateTime) -> Result<NewPost, DomainError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("title", "must not be empty"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::validation(
                "title",
                format!("must be at most {MAX_TITLE_CHARS} characters"),
            ));
        }

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(explicit) if !explicit.is_empty() => slugify(explicit),
            _ => slugify(&title),
        };
        if slug.is_empty() {
            return Err(DomainError::validation(
                "slug",
                "could not derive a slug from the title",
            ));
        }

        let excerpt = self
            .excerpt
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if let Some(excerpt) = excerpt.as_deref()
            && excerpt.chars().count() > MAX_EXCERPT_CHARS
        {
            return Err(DomainError::validation(
                "excerpt",
                format!("must be at most {MAX_EXCERPT_CHARS} characters"),
            ));
        }

        let status = match self.status.as_deref() {
            Some(raw) => raw.parse::<PostStatus>()?,
            None => PostStatus::Draft,
        };

        let published_at = status.is_public().then_some(now);

        Ok(NewPost {
            title,
            slug,
            excerpt,
            content: self.content,
            cover_image: self.cover_image.filter(|value| !value.trim().is_empty()),
            status,
            featured: self.featured,
            category: self.category,
            published_at,
        })
    }
}

impl NewPost {
    /// Render the item body expected by the CMS `items` endpoint.
    pub fn into_item(self) -> Map<String, Value> {
        let mut item = Map::new();
        item.insert("title".into(), Value::String(self.title));
        item.insert("slug".into(), Value::String(self.slug));
        item.insert("status".into(), Value::String(self.status.as_str().into()));
        item.insert("featured".into(), Value::Bool(self.featured));
        if let Some(excerpt) = self.excerpt {
            item.insert("excerpt".into(), Value::String(excerpt));
        }
        if let Some(content) = self.content {
            item.insert("content".into(), Value::from(content));
        }
        if let Some(cover) = self.cover_image {
            item.insert("cover_image".into(), Value::String(cover));
        }
        if let Some(category) = self.category {
            item.insert("category".into(), category);
        }
        if let Some(published_at) = self.published_at
            && let Ok(rendered) =
                published_at.format(&time::format_description::well_known::Rfc3339)
        {
            item.insert("published_at".into(), Value::String(rendered));
        }
        item
    }
}
