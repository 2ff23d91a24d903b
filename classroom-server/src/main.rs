//! Process entry point: loads configuration, wires concrete infrastructure
//! clients into an [`classroom_core::AppContext`], and serves the websocket
//! upgrade endpoint.

mod ws;

use std::sync::Arc;

use aws_config::BehaviorVersion;
use axum::routing::get;
use axum::Router;
use classroom_core::auth::HttpTokenVerifier;
use classroom_core::config::Config;
use classroom_core::kv::RedisKv;
use classroom_core::metastore::PostgresMetadataStore;
use classroom_core::objectstore::S3ObjectStore;
use classroom_core::AppContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env().expect("invalid configuration");
    install_tracing(config.debug);

    let kv = Arc::new(RedisKv::connect(&database_url_for_db(&config.kv_url, config.kv_db)).await?);
    let cache_kv = Arc::new(RedisKv::connect(&database_url_for_db(&config.kv_url, config.cache_db)).await?);
    let metadata = Arc::new(PostgresMetadataStore::connect(&config.database_url).await?);

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let objects = Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&aws_config), config.object_bucket.clone()));

    let http_client = reqwest::Client::new();
    let token_verifier = Arc::new(HttpTokenVerifier::new(http_client, config.auth_endpoint.clone()));

    let bind_addr = config.bind_addr;
    let ctx = Arc::new(AppContext::new(config, kv, cache_kv, objects, metadata, token_verifier));

    let app = Router::new()
        .route("/ws", get(ws::upgrade))
        .with_state(ctx);

    tracing::info!(%bind_addr, "starting classroom-server");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Redis connection strings address a logical DB with a `/` path segment;
/// `kv_url`/`cache_db` are kept as separate config fields (spec §5
/// "cache_db") rather than baked into one URL, so this stitches them back
/// together for `RedisKv::connect`.
fn database_url_for_db(base_url: &str, db: u8) -> String {
    let trimmed = base_url.trim_end_matches('/');
    format!("{trimmed}/{db}")
}

fn install_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
