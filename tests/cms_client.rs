//! CMS adapters against a mock Directus server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use folio::application::repos::{
    AssetsRepo, CategoriesRepo, DirectoryRepo, PostQueryFilter, PostsRepo, PostsWriteRepo,
    RepoError, SessionToken,
};
use folio::config::CmsSettings;
use folio::domain::posts::PostDraft;
use folio::domain::types::PostStatus;
use folio::infra::cms::{CmsClientFactory, DirectusRepositories};
use time::macros::datetime;

fn settings(server: &MockServer, token: Option<&str>) -> CmsSettings {
    CmsSettings {
        url: Some(Url::parse(&server.uri()).expect("mock url")),
        token: token.map(str::to_string),
        timeout: Duration::from_secs(5),
    }
}

fn repos(server: &MockServer, token: Option<&str>) -> DirectusRepositories {
    DirectusRepositories::new(Arc::new(CmsClientFactory::new(settings(server, token))))
}

#[tokio::test]
async fn static_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/categories"))
        .and(header("authorization", "Bearer static-token"))
        .and(query_param("fields", "id,name,slug,description"))
        .and(query_param("sort", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1, "name": "News", "slug": "news", "description": null}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let categories = repos(&server, Some("static-token"))
        .list_categories()
        .await
        .expect("categories");

    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].slug, "news");
}

#[tokio::test]
async fn anonymous_client_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "b1c2", "name": "Editor"}]
        })))
        .mount(&server)
        .await;

    let roles = repos(&server, None).list_roles().await.expect("roles");
    assert_eq!(roles[0].name, "Editor");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn post_listing_shapes_query_and_counts_returned_items() {
    let server = MockServer::start().await;
    let expected_filter = json!({"_and": [{"status": {"_eq": "published"}}]}).to_string();
    Mock::given(method("GET"))
        .and(path("/items/posts"))
        .and(query_param("filter", expected_filter.as_str()))
        .and(query_param("sort", "-published_at"))
        .and(query_param("limit", "2"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": 7,
                    "title": "Hello",
                    "slug": "hello",
                    "status": "published",
                    "published_at": "2024-05-01T10:00:00",
                    "cover_image": {"id": "f0e1"},
                    "category": {"id": 1, "name": "News", "slug": "news"},
                    "tags": [{"tags_id": {"id": 3, "name": "rust", "slug": "rust"}}]
                },
                {"id": 8, "title": "Again", "slug": "again", "status": "published"}
            ],
            "meta": {"filter_count": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let filter = PostQueryFilter {
        status: Some(PostStatus::Published),
        limit: 2,
        offset: 4,
        ..PostQueryFilter::default()
    };
    let page = repos(&server, None).list_posts(&filter).await.expect("posts");

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 2);
    let post = &page.items[0];
    assert_eq!(post.cover_image.as_deref(), Some("f0e1"));
    assert_eq!(post.published_at, Some(datetime!(2024-05-01 10:00 UTC)));
    assert_eq!(post.category.as_ref().map(|c| c.slug.as_str()), Some("news"));
    assert_eq!(post.tags[0].slug, "rust");

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests[0].url.query_pairs().all(|(key, _)| key != "meta"));
}

#[tokio::test]
async fn undecodable_rows_are_skipped_from_listings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 1, "title": "Under review", "slug": "under-review", "status": "review"},
                {"id": 2, "title": "Live", "slug": "live", "status": "published"}
            ]
        })))
        .mount(&server)
        .await;

    let page = repos(&server, None)
        .list_posts(&PostQueryFilter::default())
        .await
        .expect("posts");

    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].slug, "live");
}

#[tokio::test]
async fn missing_slug_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/posts"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let post = repos(&server, None)
        .find_post_by_slug("nope")
        .await
        .expect("lookup");
    assert!(post.is_none());
}

#[tokio::test]
async fn upstream_failures_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/categories"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "errors": [{"message": "database unavailable"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"message": "Invalid user credentials."}]
        })))
        .mount(&server)
        .await;

    let repos = repos(&server, None);
    match repos.list_categories().await {
        Err(RepoError::Upstream { status, message }) => {
            assert_eq!(status, Some(500));
            assert!(message.contains("database unavailable"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }

    let session = SessionToken::new("stale").expect("token");
    assert!(matches!(
        repos.list_users(&session).await,
        Err(RepoError::Unauthorized)
    ));
}

#[tokio::test]
async fn writes_forward_the_session_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/posts"))
        .and(header("authorization", "Bearer user-session"))
        .and(body_partial_json(json!({"title": "Hello World", "slug": "hello-world"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 11, "title": "Hello World", "slug": "hello-world", "status": "draft"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let draft = PostDraft {
        title: "Hello World".to_string(),
        ..PostDraft::default()
    };
    let new_post = draft
        .validate(datetime!(2024-05-01 10:00 UTC))
        .expect("valid draft");
    let session = SessionToken::new("user-session").expect("token");

    let created = repos(&server, Some("static-token"))
        .create_post(&session, new_post)
        .await
        .expect("created");
    assert_eq!(created.slug, "hello-world");
    assert_eq!(created.status, PostStatus::Draft);
}

#[tokio::test]
async fn schema_rejections_surface_as_invalid_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items/posts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"message": "Value for field \"slug\" has to be unique."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let new_post = PostDraft {
        title: "Hello World".to_string(),
        ..PostDraft::default()
    }
    .validate(datetime!(2024-05-01 10:00 UTC))
    .expect("valid draft");
    let session = SessionToken::new("user-session").expect("token");

    match repos(&server, None).create_post(&session, new_post).await {
        Err(RepoError::InvalidInput { message }) => {
            assert_eq!(message, "Value for field \"slug\" has to be unique.");
        }
        other => panic!("expected invalid input, got {other:?}"),
    }
}

#[tokio::test]
async fn assets_stream_bytes_and_map_missing_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assets/covers/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(b"jpeg-bytes".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets/gone"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let repos = repos(&server, None);
    let asset = repos
        .fetch_asset("covers/a.jpg")
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(asset.bytes.as_ref(), b"jpeg-bytes");
    assert_eq!(asset.content_type.as_deref(), Some("image/jpeg"));

    assert!(repos.fetch_asset("gone").await.expect("fetch").is_none());
}

#[tokio::test]
async fn factory_without_url_reports_configuration_error() {
    let repos = DirectusRepositories::new(Arc::new(CmsClientFactory::new(CmsSettings::default())));
    assert!(matches!(
        repos.list_categories().await,
        Err(RepoError::Configuration(_))
    ));
}

#[test]
fn factory_shares_one_client_across_threads() {
    let factory = CmsClientFactory::new(CmsSettings {
        url: Some(Url::parse("https://cms.example").expect("url")),
        token: None,
        timeout: Duration::from_secs(1),
    });

    let clients: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| factory.get_client().expect("client")))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect()
    });

    assert!(clients.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}
