#![cfg_attr(debug_assertions, allow(dead_code, unused_imports))]

use axum::{
    extract::DefaultBodyLimit, http::Method, Router
};

use hyper::header::{ACCEPT, CONTENT_TYPE};
use model::{identity_store::IdentityStore, store::SqliteStore, ModelController};
use server::{get_model_path, get_server_bind_address, get_server_file_path_array, get_threshold};
use tokio::net::TcpListener;
use tools::{log::{init_logging, log_info, LogServiceType}, recognition::EmbeddingService};
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
pub use self::error::{Result, Error};

mod model;
mod routes;
mod error;
mod tools;
mod server;
mod domain;


#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    log_info(LogServiceType::Register, "Starting faceid server".to_string());
    log_info(LogServiceType::Register, "Initializing config".to_string());
    let config = server::initialize_config().await?;

    let db_path = get_server_file_path_array(vec!["dbs", "identities.db"]).await?;
    log_info(LogServiceType::Database, format!("Opening identities database {:?}", db_path));
    let store = SqliteStore::new(&db_path).await?;
    let identities = IdentityStore::open(store).await?;

    // loaded on the first enrollment or recognition
    let embedder = EmbeddingService::from_model_path(get_model_path().await?, config.intra_threads);
    let mc = ModelController::new(identities, embedder, get_threshold().await?);

    let listener = TcpListener::bind(get_server_bind_address().await?).await?;
    log_info(LogServiceType::Register, format!("->> LISTENING on {:?}\n", listener.local_addr()));

    axum::serve(listener, app(mc.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_info(LogServiceType::Register, "Shutting down".to_string());
    mc.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn app(mc: ModelController) -> Router {
    let cors: CorsLayer = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::PATCH, Method::DELETE, Method::OPTIONS, Method::POST])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        // allow requests from any origin
        .allow_origin(Any);

    Router::new()
        .nest("/ping", routes::ping::routes(mc.clone()))
        .nest("/identities", routes::identities::routes(mc))
        // base64 images are larger than the default limit
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
        )
}
