//! Repository traits describing CMS-backed adapters.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::entities::{Category, DocumentType, Post, PostPage, Role, Tag, User};
use crate::domain::posts::NewPost;
use crate::domain::types::PostStatus;

pub const DEFAULT_POST_LIMIT: u32 = 10;
pub const MAX_POST_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("upstream error ({status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
    #[error("cms rejected the credentials")]
    Unauthorized,
    #[error("cms payload could not be decoded: {0}")]
    Decode(String),
    #[error("cms request timed out")]
    Timeout,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("cms client is not configured: {0}")]
    Configuration(String),
}

impl RepoError {
    pub fn upstream(status: Option<u16>, message: impl fmt::Display) -> Self {
        Self::Upstream {
            status,
            message: message.to_string(),
        }
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Session credential forwarded to the CMS for authenticated calls.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Returns `None` for blank input.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Filter applied to post listings.
#[derive(Debug, Clone, PartialEq)]
pub struct PostQueryFilter {
    pub status: Option<PostStatus>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for PostQueryFilter {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            featured: None,
            search: None,
            limit: DEFAULT_POST_LIMIT,
            offset: 0,
        }
    }
}

impl PostQueryFilter {
    /// Clamp paging values into the accepted window and drop blank strings.
    pub fn normalized(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_POST_LIMIT);
        self.category = self
            .category
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.search = self
            .search
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self
    }
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError>;

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>, RepoError>;

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(&self, filter: &PostQueryFilter) -> Result<PostPage, RepoError>;

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, session: &SessionToken, post: NewPost)
    -> Result<Post, RepoError>;
}

#[async_trait]
pub trait DirectoryRepo: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<Role>, RepoError>;

    async fn list_users(&self, session: &SessionToken) -> Result<Vec<User>, RepoError>;

    async fn list_document_types(&self) -> Result<Vec<DocumentType>, RepoError>;
}

/// Stored binary object served through the asset proxy.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait AssetsRepo: Send + Sync {
    async fn fetch_asset(&self, key: &str) -> Result<Option<StoredAsset>, RepoError>;
}
