pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/replica/{group}/{version}/{resource}", get(handlers::handle_replica_list))
        .route(
            "/replica/{group}/{version}/{resource}/{namespace}/{name}",
            get(handlers::handle_replica_get),
        )
        .route("/shutdown", post(handlers::handle_shutdown))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    tracing::info!(port, "admin API listening on 127.0.0.1");
    axum::serve(listener, app).await?;
    Ok(())
}
