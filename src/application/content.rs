//! Content queries backed by the CMS and the query cache.
//!
//! Only the parameter-free taxonomy reads (categories, tags and their by-slug
//! lookups) are cached. Post listings vary with arbitrary filters and are
//! cached at the HTTP layer through `Cache-Control` instead.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::application::assets::{AssetResolver, normalize_content, validate_asset_key};
use crate::application::repos::{
    AssetsRepo, CategoriesRepo, DirectoryRepo, PostQueryFilter, PostsRepo, PostsWriteRepo,
    RepoError, SessionToken, StoredAsset, TagsRepo,
};
use crate::cache::{Clock, InvalidationTag, QueryCache, QueryDescriptor, SystemClock};
use crate::domain::entities::{Category, DocumentType, Post, PostPage, Role, Tag, User};
use crate::domain::error::DomainError;
use crate::domain::posts::PostDraft;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("a valid session is required")]
    Unauthorized,
    #[error("content service is not configured: {0}")]
    Configuration(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for ContentError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Unauthorized => ContentError::Unauthorized,
            RepoError::Configuration(message) => ContentError::Configuration(message),
            other => ContentError::Repo(other),
        }
    }
}

/// Repository handles the content service reads from and writes to.
#[derive(Clone)]
pub struct ContentRepositories {
    pub categories: Arc<dyn CategoriesRepo>,
    pub tags: Arc<dyn TagsRepo>,
    pub posts: Arc<dyn PostsRepo>,
    pub post_writes: Arc<dyn PostsWriteRepo>,
    pub directory: Arc<dyn DirectoryRepo>,
    pub assets: Arc<dyn AssetsRepo>,
}

/// Slugs are matched case-insensitively so differently cased paths share one
/// cache entry and one invalidation tag.
fn slug_key(slug: &str) -> String {
    slug.trim().to_lowercase()
}

#[derive(Clone)]
pub struct ContentService {
    repos: ContentRepositories,
    cache: Arc<QueryCache>,
    assets: AssetResolver,
    clock: Arc<dyn Clock>,
}

impl ContentService {
    pub fn new(repos: ContentRepositories, cache: Arc<QueryCache>, assets: AssetResolver) -> Self {
        Self {
            repos,
            cache,
            assets,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// All categories sorted by name.
    pub async fn get_categories(&self) -> Result<Vec<Category>, ContentError> {
        let descriptor = QueryDescriptor::new("categories");
        let repo = self.repos.categories.clone();
        let categories = self
            .cache
            .get_or_fetch(&descriptor, [InvalidationTag::categories()], || async move {
                let mut categories = repo.list_categories().await?;
                categories.sort_by_cached_key(|category| category.name.to_lowercase());
                Ok::<_, RepoError>(categories)
            })
            .await?;
        Ok(categories)
    }

    /// The category with `slug`; a miss is cached like a hit.
    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, ContentError> {
        let slug = slug_key(slug);
        let descriptor = QueryDescriptor::new("category").param("slug", slug.as_str());
        let repo = self.repos.categories.clone();
        let lookup = slug.clone();
        let category = self
            .cache
            .get_or_fetch(
                &descriptor,
                [InvalidationTag::categories(), InvalidationTag::category(&slug)],
                || async move { repo.find_category_by_slug(&lookup).await },
            )
            .await?;
        Ok(category)
    }

    /// All tags sorted by name.
    pub async fn get_tags(&self) -> Result<Vec<Tag>, ContentError> {
        let descriptor = QueryDescriptor::new("tags");
        let repo = self.repos.tags.clone();
        let tags = self
            .cache
            .get_or_fetch(&descriptor, [InvalidationTag::tags()], || async move {
                let mut tags = repo.list_tags().await?;
                tags.sort_by_cached_key(|tag| tag.name.to_lowercase());
                Ok::<_, RepoError>(tags)
            })
            .await?;
        Ok(tags)
    }

    pub async fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, ContentError> {
        let slug = slug_key(slug);
        let descriptor = QueryDescriptor::new("tag").param("slug", slug.as_str());
        let repo = self.repos.tags.clone();
        let lookup = slug.clone();
        let tag = self
            .cache
            .get_or_fetch(
                &descriptor,
                [InvalidationTag::tags(), InvalidationTag::tag(&slug)],
                || async move { repo.find_tag_by_slug(&lookup).await },
            )
            .await?;
        Ok(tag)
    }

    #[instrument(skip(self), fields(limit = filter.limit, offset = filter.offset))]
    pub async fn get_posts(&self, filter: PostQueryFilter) -> Result<PostPage, ContentError> {
        let filter = filter.normalized();
        let page = self.repos.posts.list_posts(&filter).await?;
        Ok(PostPage {
            items: page
                .items
                .into_iter()
                .map(|post| self.present_post(post))
                .collect(),
            total: page.total,
        })
    }

    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError> {
        let post = self.repos.posts.find_post_by_slug(slug).await?;
        Ok(post.map(|post| self.present_post(post)))
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, ContentError> {
        Ok(self.repos.directory.list_roles().await?)
    }

    pub async fn list_users(&self, session: Option<&SessionToken>) -> Result<Vec<User>, ContentError> {
        let session = session.ok_or(ContentError::Unauthorized)?;
        Ok(self.repos.directory.list_users(session).await?)
    }

    pub async fn list_document_types(&self) -> Result<Vec<DocumentType>, ContentError> {
        Ok(self.repos.directory.list_document_types().await?)
    }

    /// Bytes of the asset under `key`, or `None` when the CMS has no such file.
    pub async fn fetch_asset(&self, key: &str) -> Result<Option<StoredAsset>, ContentError> {
        let key = validate_asset_key(key)?;
        Ok(self.repos.assets.fetch_asset(key).await?)
    }

    /// Validate `draft` locally, then create it with the caller's session.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn create_post(
        &self,
        session: Option<&SessionToken>,
        draft: PostDraft,
    ) -> Result<Post, ContentError> {
        let session = session.ok_or(ContentError::Unauthorized)?;
        let post = draft.validate(self.clock.now())?;
        let slug = post.slug.clone();

        let created = self.repos.post_writes.create_post(session, post).await?;
        info!(
            target: "folio::application::content",
            slug = %slug,
            status = %created.status,
            "post created"
        );
        Ok(self.present_post(created))
    }

    /// Evict every cached entry carrying one of `tags`.
    pub fn invalidate<I>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = InvalidationTag>,
    {
        let removed: usize = tags
            .into_iter()
            .map(|tag| self.cache.invalidate_tag(&tag))
            .sum();
        info!(target: "folio::application::content", removed, "cache invalidated");
        removed
    }

    fn present_post(&self, mut post: Post) -> Post {
        post.content = post.content.map(normalize_content);
        post.cover_image = post
            .cover_image
            .map(|cover| self.assets.resolve(&cover));
        post
    }
}
