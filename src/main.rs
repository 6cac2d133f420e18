use std::{process, sync::Arc};

use folio::{
    application::{
        assets::{AssetResolver, LegacyHost, LegacyPolicy},
        content::{ContentRepositories, ContentService},
        error::AppError,
    },
    cache::{CacheConfig, QueryCache},
    config,
    infra::{
        cms::{CmsClientFactory, DirectusRepositories},
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const CMS_ASSET_PATH: &str = "/assets/";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CheckConfig => run_check_config(&settings),
    }
}

fn run_check_config(settings: &config::Settings) -> Result<(), AppError> {
    CmsClientFactory::new(settings.cms.clone()).get_client()?;
    info!(
        addr = %settings.server.addr,
        cms = ?settings.cms,
        cache = ?settings.cache,
        "configuration is valid"
    );
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_api_state(&settings)?;
    serve_http(&settings, state).await
}

fn build_api_state(settings: &config::Settings) -> Result<ApiState, AppError> {
    let factory = Arc::new(CmsClientFactory::new(settings.cms.clone()));
    // A missing CMS URL is fatal; surface it before accepting traffic.
    let client = factory.get_client()?;

    let directus = Arc::new(DirectusRepositories::new(factory));
    let repos = ContentRepositories {
        categories: directus.clone(),
        tags: directus.clone(),
        posts: directus.clone(),
        post_writes: directus.clone(),
        directory: directus.clone(),
        assets: directus,
    };

    let cache = Arc::new(QueryCache::new(CacheConfig::from(&settings.cache)));
    let resolver = asset_resolver(settings, client.base_url());
    let content = Arc::new(ContentService::new(repos, cache, resolver));

    Ok(ApiState::new(
        content,
        &settings.http_cache,
        settings.security.clone(),
    ))
}

/// Configured legacy hosts, then the CMS itself so direct file links are proxied.
fn asset_resolver(settings: &config::Settings, cms_base: &url::Url) -> AssetResolver {
    let resolver = AssetResolver::new(
        settings.assets.legacy_hosts.clone(),
        settings.assets.fallback_image.clone(),
    );
    match cms_base.host_str() {
        Some(host) => resolver.with_host(LegacyHost::new(
            host,
            LegacyPolicy::Proxy {
                strip_prefix: Some(CMS_ASSET_PATH.to_string()),
            },
        )),
        None => resolver,
    }
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "http server listening");

    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            let _ = stopping_tx.send(true);
        },
    );

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        if stopping_rx.wait_for(|stopping| *stopping).await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline => {
            warn!(
                grace_secs = grace.as_secs(),
                "graceful shutdown window elapsed with open connections"
            );
        }
    }

    info!("http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("shutdown signal received; draining connections");
}
