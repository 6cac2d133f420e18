use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use time::macros::datetime;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use folio::application::assets::AssetResolver;
use folio::application::content::{ContentRepositories, ContentService};
use folio::application::repos::{
    AssetsRepo, CategoriesRepo, DirectoryRepo, PostQueryFilter, PostsRepo, PostsWriteRepo,
    RepoError, SessionToken, StoredAsset, TagsRepo,
};
use folio::cache::{CacheConfig, QueryCache};
use folio::config::{CmsSettings, HttpCacheSettings, SecuritySettings};
use folio::domain::content::Content;
use folio::domain::entities::{
    Category, DocumentType, ItemId, Post, PostPage, Role, Tag, User,
};
use folio::domain::posts::NewPost;
use folio::domain::types::PostStatus;
use folio::infra::cms::{CmsClientFactory, DirectusRepositories};
use folio::infra::http::{ApiState, build_router};

const PUBLIC_CACHE: &str = "public, s-maxage=300, stale-while-revalidate=900";
const SECRET: &str = "hook-secret";
const VALID_SESSION: &str = "valid-session";

#[derive(Default)]
struct FakeCms {
    category_lists: AtomicUsize,
    created: Mutex<Vec<NewPost>>,
}

fn post(id: i64, slug: &str, status: PostStatus) -> Post {
    Post {
        id: ItemId::Int(id),
        title: format!("Post {id}"),
        slug: slug.to_string(),
        excerpt: None,
        content: Some(Content::from(json!([
            {"type": "image", "url": "https://old.example/api/assets/inline-1"}
        ]))),
        cover_image: Some("https://abc.supabase.co/storage/v1/cover.png".to_string()),
        status,
        featured: false,
        published_at: Some(datetime!(2024-05-01 10:00 UTC)),
        category: None,
        tags: Vec::new(),
    }
}

fn stored_posts() -> Vec<Post> {
    vec![
        post(1, "first", PostStatus::Published),
        post(2, "second", PostStatus::Published),
        post(3, "work-in-progress", PostStatus::Draft),
    ]
}

#[async_trait]
impl CategoriesRepo for FakeCms {
    async fn list_categories(&self) -> Result<Vec<Category>, RepoError> {
        self.category_lists.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            Category {
                id: ItemId::Int(2),
                name: "rust".to_string(),
                slug: "rust".to_string(),
                description: None,
            },
            Category {
                id: ItemId::Int(1),
                name: "News".to_string(),
                slug: "news".to_string(),
                description: None,
            },
        ])
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        Ok(self
            .list_categories()
            .await?
            .into_iter()
            .find(|category| category.slug == slug))
    }
}

#[async_trait]
impl TagsRepo for FakeCms {
    async fn list_tags(&self) -> Result<Vec<Tag>, RepoError> {
        Ok(vec![Tag {
            id: ItemId::Int(1),
            name: "async".to_string(),
            slug: "async".to_string(),
        }])
    }

    async fn find_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>, RepoError> {
        Ok(self.list_tags().await?.into_iter().find(|tag| tag.slug == slug))
    }
}

#[async_trait]
impl PostsRepo for FakeCms {
    async fn list_posts(&self, filter: &PostQueryFilter) -> Result<PostPage, RepoError> {
        let items: Vec<Post> = stored_posts()
            .into_iter()
            .filter(|post| filter.status.is_none_or(|status| post.status == status))
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok(PostPage {
            total: items.len() as u64,
            items,
        })
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        Ok(stored_posts().into_iter().find(|post| post.slug == slug))
    }
}

#[async_trait]
impl PostsWriteRepo for FakeCms {
    async fn create_post(&self, session: &SessionToken, post: NewPost) -> Result<Post, RepoError> {
        if session.as_str() != VALID_SESSION {
            return Err(RepoError::Unauthorized);
        }
        let created = Post {
            id: ItemId::Int(99),
            title: post.title.clone(),
            slug: post.slug.clone(),
            excerpt: post.excerpt.clone(),
            content: post.content.clone(),
            cover_image: post.cover_image.clone(),
            status: post.status,
            featured: post.featured,
            published_at: post.published_at,
            category: None,
            tags: Vec::new(),
        };
        self.created.lock().expect("created").push(post);
        Ok(created)
    }
}

#[async_trait]
impl DirectoryRepo for FakeCms {
    async fn list_roles(&self) -> Result<Vec<Role>, RepoError> {
        Ok(vec![Role {
            id: ItemId::Text("admin".to_string()),
            name: "Administrator".to_string(),
            description: None,
        }])
    }

    async fn list_users(&self, session: &SessionToken) -> Result<Vec<User>, RepoError> {
        if session.as_str() != VALID_SESSION {
            return Err(RepoError::Unauthorized);
        }
        Ok(Vec::new())
    }

    async fn list_document_types(&self) -> Result<Vec<DocumentType>, RepoError> {
        Err(RepoError::upstream(Some(503), "maintenance"))
    }
}

#[async_trait]
impl AssetsRepo for FakeCms {
    async fn fetch_asset(&self, key: &str) -> Result<Option<StoredAsset>, RepoError> {
        Ok((key == "covers/a.png").then(|| StoredAsset {
            bytes: Bytes::from_static(b"\x89PNG"),
            content_type: None,
        }))
    }
}

struct TestApp {
    router: Router,
    cms: Arc<FakeCms>,
}

fn fake_repositories(cms: &Arc<FakeCms>) -> ContentRepositories {
    ContentRepositories {
        categories: cms.clone(),
        tags: cms.clone(),
        posts: cms.clone(),
        post_writes: cms.clone(),
        directory: cms.clone(),
        assets: cms.clone(),
    }
}

fn router_for(repos: ContentRepositories, secret: Option<&str>) -> Router {
    let cache = Arc::new(QueryCache::new(CacheConfig::default()));
    let content = Arc::new(ContentService::new(repos, cache, AssetResolver::default()));
    let security = SecuritySettings {
        revalidate_secret: secret.map(str::to_string),
        ..SecuritySettings::default()
    };
    build_router(ApiState::new(content, &HttpCacheSettings::default(), security))
}

fn app_with(secret: Option<&str>) -> TestApp {
    let cms = Arc::new(FakeCms::default());
    TestApp {
        router: router_for(fake_repositories(&cms), secret),
        cms,
    }
}

fn app() -> TestApp {
    app_with(Some(SECRET))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let cache_control = response
        .headers()
        .get(header::CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, cache_control, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn published_listing_is_publicly_cacheable() {
    let app = app();
    let (status, cache, body) = send(
        &app.router,
        get("/api/posts?status=published&limit=2"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some(PUBLIC_CACHE));
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn draft_and_search_listings_are_not_stored() {
    let app = app();

    let (status, cache, body) = send(&app.router, get("/api/posts?status=draft")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("no-store"));
    assert_eq!(body["data"][0]["slug"], "work-in-progress");

    let (_, cache, _) = send(&app.router, get("/api/posts?search=rust")).await;
    assert_eq!(cache.as_deref(), Some("no-store"));
}

#[tokio::test]
async fn listing_rejects_unknown_status() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/api/posts?status=secret")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid query");
}

#[tokio::test]
async fn post_detail_normalizes_assets() {
    let app = app();
    let (status, cache, body) = send(&app.router, get("/api/posts/first")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some(PUBLIC_CACHE));
    assert_eq!(body["data"]["cover_image"], "/images/placeholder.png");
    assert_eq!(body["data"]["content"][0]["url"], "/api/assets/inline-1");
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/api/posts/missing")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Post not found"}));
}

#[tokio::test]
async fn taxonomy_routes_sort_and_report_missing_slugs() {
    let app = app();

    let (status, cache, body) = send(&app.router, get("/api/categories")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some(PUBLIC_CACHE));
    assert_eq!(body["data"][0]["name"], "News");
    assert_eq!(body["total"], 2);

    let (status, _, body) = send(&app.router, get("/api/categories/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Category not found");

    let (status, _, body) = send(&app.router, get("/api/tags/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tag not found");

    let (status, _, body) = send(&app.router, get("/api/tags/async")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "async");
}

#[tokio::test]
async fn writes_without_csrf_token_are_forbidden() {
    let app = app();
    let (status, _, body) = send(
        &app.router,
        post_json("/api/posts", json!({"title": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "Invalid CSRF token"}));

    let mismatched = Request::builder()
        .method(Method::POST)
        .uri("/api/posts")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-csrf-token", "abc")
        .header(header::COOKIE, "csrf_token=xyz")
        .body(Body::from(json!({"title": "Hello"}).to_string()))
        .expect("request");
    let (status, _, _) = send(&app.router, mismatched).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.cms.created.lock().expect("created").is_empty());
}

fn guarded_post(cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/posts")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-csrf-token", "token-1")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn create_post_requires_session_and_valid_body() {
    let app = app();

    let (status, _, _) = send(
        &app.router,
        guarded_post("csrf_token=token-1", json!({"title": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app.router,
        guarded_post(
            "csrf_token=token-1; session_token=expired",
            json!({"title": "Hello"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(
        &app.router,
        guarded_post(
            "csrf_token=token-1; session_token=valid-session",
            json!({"title": "   "}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid input");

    let (status, cache, body) = send(
        &app.router,
        guarded_post(
            "csrf_token=token-1; session_token=valid-session",
            json!({"title": "Hello World", "status": "published"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cache.as_deref(), Some("no-store"));
    assert_eq!(body["data"]["slug"], "hello-world");
    assert_eq!(app.cms.created.lock().expect("created").len(), 1);
}

#[tokio::test]
async fn cms_schema_rejection_is_a_bad_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/posts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"message": "Value for field \"slug\" has to be unique."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let directus = Arc::new(DirectusRepositories::new(Arc::new(CmsClientFactory::new(
        CmsSettings {
            url: Some(Url::parse(&server.uri()).expect("mock url")),
            token: None,
            timeout: Duration::from_secs(5),
        },
    ))));
    let cms = Arc::new(FakeCms::default());
    let repos = ContentRepositories {
        post_writes: directus,
        ..fake_repositories(&cms)
    };
    let router = router_for(repos, Some(SECRET));

    let (status, _, body) = send(
        &router,
        guarded_post(
            "csrf_token=token-1; session_token=valid-session",
            json!({"title": "Hello World"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid input");
    assert_eq!(body["hint"], "Value for field \"slug\" has to be unique.");
}

fn revalidate_request(secret: Option<&str>, tags: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/revalidate")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-revalidate-secret", secret);
    }
    builder
        .body(Body::from(json!({ "tags": tags }).to_string()))
        .expect("request")
}

#[tokio::test]
async fn revalidation_evicts_tagged_entries() {
    let app = app();

    send(&app.router, get("/api/categories")).await;
    send(&app.router, get("/api/categories")).await;
    assert_eq!(app.cms.category_lists.load(Ordering::SeqCst), 1);

    let (status, _, _) = send(
        &app.router,
        revalidate_request(Some("wrong"), json!(["categories"])),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app.router, revalidate_request(None, json!(["categories"]))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(
        &app.router,
        revalidate_request(Some(SECRET), json!(["categories"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"revalidated": 1}));

    send(&app.router, get("/api/categories")).await;
    assert_eq!(app.cms.category_lists.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn revalidation_is_hidden_without_secret() {
    let app = app_with(None);
    let (status, _, _) = send(
        &app.router,
        revalidate_request(Some(SECRET), json!(["categories"])),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assets_are_proxied_with_long_lived_caching() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(get("/api/assets/covers/a.png"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000, immutable"
    );

    let (status, _, body) = send(&app.router, get("/api/assets/covers/missing.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Asset not found");

    let (status, _, _) = send(&app.router, get("/api/assets/covers//a.png")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn directory_routes_map_session_and_upstream_failures() {
    let app = app();

    let (status, cache, body) = send(&app.router, get("/api/roles")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("no-store"));
    assert_eq!(body["data"][0]["name"], "Administrator");

    let (status, _, _) = send(&app.router, get("/api/users")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(&app.router, get("/api/document-types")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Upstream request failed"}));
}

#[tokio::test]
async fn health_endpoint_returns_no_content() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/_health")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}
