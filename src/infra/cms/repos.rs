//! Repository adapters over the Directus REST API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::warn;

use crate::application::repos::{
    AssetsRepo, CategoriesRepo, DirectoryRepo, PostQueryFilter, PostsRepo, PostsWriteRepo,
    RepoError, SessionToken, StoredAsset, TagsRepo,
};
use crate::domain::content::Content;
use crate::domain::entities::{Category, DocumentType, ItemId, Post, PostPage, Role, Tag, User};
use crate::domain::posts::NewPost;
use crate::domain::types::PostStatus;
use crate::infra::error::InfraError;

use super::client::{CmsClient, ItemQuery, ItemsResponse};
use super::factory::CmsClientFactory;

const CATEGORIES: &str = "categories";
const TAGS: &str = "tags";
const POSTS: &str = "posts";
const DOCUMENT_TYPES: &str = "document_types";

const TAXONOMY_FIELDS: &[&str] = &["id", "name", "slug", "description"];
const TAG_FIELDS: &[&str] = &["id", "name", "slug"];
const ROLE_FIELDS: &[&str] = &["id", "name", "description"];
const USER_FIELDS: &[&str] = &["id", "first_name", "last_name", "email", "role"];
const DOCUMENT_TYPE_FIELDS: &[&str] = &["id", "name", "slug"];
const POST_FIELDS: &[&str] = &[
    "id",
    "title",
    "slug",
    "excerpt",
    "content",
    "cover_image",
    "status",
    "featured",
    "published_at",
    "category.id",
    "category.name",
    "category.slug",
    "category.description",
    "tags.tags_id.id",
    "tags.tags_id.name",
    "tags.tags_id.slug",
];

impl From<InfraError> for RepoError {
    fn from(err: InfraError) -> Self {
        if err.is_timeout() {
            return RepoError::Timeout;
        }
        match err {
            InfraError::Configuration { message } => RepoError::Configuration(message),
            InfraError::Upstream {
                status: 401 | 403, ..
            } => RepoError::Unauthorized,
            // Directus reports schema and uniqueness violations as 400 or 422.
            InfraError::Upstream {
                status: 400 | 422,
                message,
            } => RepoError::invalid_input(message),
            InfraError::Upstream { status, message } => RepoError::upstream(Some(status), message),
            InfraError::Decode { message } => RepoError::Decode(message),
            other => RepoError::upstream(other.upstream_status(), other),
        }
    }
}

/// All content repositories, sharing one lazily built CMS client.
#[derive(Clone)]
pub struct DirectusRepositories {
    factory: Arc<CmsClientFactory>,
}

impl DirectusRepositories {
    pub fn new(factory: Arc<CmsClientFactory>) -> Self {
        Self { factory }
    }

    fn client(&self) -> Result<Arc<CmsClient>, RepoError> {
        Ok(self.factory.get_client()?)
    }
}

#[async_trait]
impl CategoriesRepo for DirectusRepositories {
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        let query = ItemQuery::new().fields(TAXONOMY_FIELDS.iter().copied()).sort("name");
        let page: ItemsResponse<Category> = self.client()?.list_items(CATEGORIES, &query).await?;
        Ok(page.data)
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let query = ItemQuery::new().fields(TAXONOMY_FIELDS.iter().copied());
        Ok(self
            .client()?
            .read_item_by_slug(CATEGORIES, slug, &query)
            .await?)
    }
}

#[async_trait]
impl TagsRepo for DirectusRepositories {
    async fn list_tags(&self) -> Result<Vec<Tag>, RepoError> {
        let query = ItemQuery::new().fields(TAG_FIELDS.iter().copied()).sort("name");
        let page: ItemsResponse<Tag> = self.client()?.list_items(TAGS, &query).await?;
        Ok(page.data)
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError> {
        let query = ItemQuery::new().fields(TAG_FIELDS.iter().copied());
        Ok(self.client()?.read_item_by_slug(TAGS, slug, &query).await?)
    }
}

#[async_trait]
impl PostsRepo for DirectusRepositories {
    async fn list_posts(&self, filter: &PostQueryFilter) -> Result<PostPage, RepoError> {
        let query = post_list_query(filter);
        let page: ItemsResponse<RawPost> = self.client()?.list_items(POSTS, &query).await?;

        let mut items = Vec::with_capacity(page.data.len());
        for raw in page.data {
            let id = raw.id.clone();
            match raw.into_post() {
                Ok(post) => items.push(post),
                Err(err) => warn!(
                    target: "folio::infra::cms",
                    post_id = %id,
                    error = %err,
                    "skipping post that could not be decoded"
                ),
            }
        }
        Ok(PostPage {
            total: items.len() as u64,
            items,
        })
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let query = ItemQuery::new().fields(POST_FIELDS.iter().copied());
        let raw: Option<RawPost> = self.client()?.read_item_by_slug(POSTS, slug, &query).await?;
        raw.map(RawPost::into_post).transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for DirectusRepositories {
    async fn create_post(&self, session: &SessionToken, post: NewPost) -> Result<Post, RepoError> {
        let client = self.client()?.with_token(session.as_str());
        let body = Value::Object(post.into_item());
        let query = ItemQuery::new().fields(POST_FIELDS.iter().copied());
        let raw: RawPost = client.create_item(POSTS, &body, &query).await?;
        raw.into_post()
    }
}

#[async_trait]
impl DirectoryRepo for DirectusRepositories {
    async fn list_roles(&self) -> Result<Vec<Role>, RepoError> {
        let query = ItemQuery::new().fields(ROLE_FIELDS.iter().copied()).sort("name");
        Ok(self.client()?.read_roles(&query).await?)
    }

    async fn list_users(&self, session: &SessionToken) -> Result<Vec<User>, RepoError> {
        let client = self.client()?.with_token(session.as_str());
        let query = ItemQuery::new().fields(USER_FIELDS.iter().copied());
        Ok(client.read_users(&query).await?)
    }

    async fn list_document_types(&self) -> Result<Vec<DocumentType>, RepoError> {
        let query = ItemQuery::new()
            .fields(DOCUMENT_TYPE_FIELDS.iter().copied())
            .sort("name");
        let page: ItemsResponse<DocumentType> =
            self.client()?.list_items(DOCUMENT_TYPES, &query).await?;
        Ok(page.data)
    }
}

#[async_trait]
impl AssetsRepo for DirectusRepositories {
    async fn fetch_asset(&self, key: &str) -> Result<Option<StoredAsset>, RepoError> {
        match self.client()?.fetch_asset(key).await {
            Ok(body) => Ok(Some(StoredAsset {
                bytes: body.bytes,
                content_type: body.content_type,
            })),
            // Directus answers 403 for files the token cannot see, including missing ones.
            Err(err) if matches!(err.upstream_status(), Some(403 | 404)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

fn post_list_query(filter: &PostQueryFilter) -> ItemQuery {
    let mut clauses = Vec::new();
    if let Some(status) = filter.status {
        clauses.push(json!({ "status": { "_eq": status.as_str() } }));
    }
    if let Some(category) = filter.category.as_deref() {
        clauses.push(json!({ "category": { "slug": { "_eq": category } } }));
    }
    if let Some(featured) = filter.featured {
        clauses.push(json!({ "featured": { "_eq": featured } }));
    }

    let mut query = ItemQuery::new()
        .fields(POST_FIELDS.iter().copied())
        .sort("-published_at")
        .limit(filter.limit)
        .offset(filter.offset);
    if !clauses.is_empty() {
        query = query.filter(json!({ "_and": clauses }));
    }
    if let Some(search) = filter.search.as_deref() {
        query = query.search(search);
    }
    query
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: ItemId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    cover_image: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    featured: Option<bool>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    category: Option<Value>,
    #[serde(default)]
    tags: Option<Vec<Value>>,
}

impl RawPost {
    fn into_post(self) -> Result<Post, RepoError> {
        let id = self.id;
        let title = self
            .title
            .ok_or_else(|| RepoError::decode(format!("post `{id}` has no title")))?;
        let slug = self
            .slug
            .ok_or_else(|| RepoError::decode(format!("post `{id}` has no slug")))?;
        let status = match self.status.as_deref() {
            Some(raw) => raw.parse::<PostStatus>().map_err(RepoError::decode)?,
            None => PostStatus::Draft,
        };
        let published_at = self
            .published_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let category = match self.category {
            Some(value @ Value::Object(_)) => {
                Some(serde_json::from_value::<Category>(value).map_err(RepoError::decode)?)
            }
            _ => None,
        };
        let tags = self
            .tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|link| match link {
                Value::Object(mut map) => match map.remove("tags_id") {
                    Some(tag @ Value::Object(_)) => Some(tag),
                    _ => None,
                },
                _ => None,
            })
            .map(|tag| serde_json::from_value::<Tag>(tag).map_err(RepoError::decode))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Post {
            id,
            title,
            slug,
            excerpt: self.excerpt,
            content: self.content.map(Content::from),
            cover_image: self.cover_image.and_then(asset_reference),
            status,
            featured: self.featured.unwrap_or(false),
            published_at,
            category,
            tags,
        })
    }
}

/// File fields come back as a bare id or, when expanded, an object with `id`.
fn asset_reference(value: Value) -> Option<String> {
    let reference = match value {
        Value::String(reference) => reference,
        Value::Object(mut map) => match map.remove("id") {
            Some(Value::String(reference)) => reference,
            _ => return None,
        },
        _ => return None,
    };
    (!reference.trim().is_empty()).then_some(reference)
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, RepoError> {
    if let Ok(timestamp) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(timestamp);
    }
    // `datetime` fields carry no offset; the CMS stores them in UTC.
    PrimitiveDateTime::parse(
        raw,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .map(PrimitiveDateTime::assume_utc)
    .map_err(|err| RepoError::decode(format!("invalid timestamp `{raw}`: {err}")))
}
