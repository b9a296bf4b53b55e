mod error;
mod routes;
mod state;

use axum::routing::get;
use axum::Router;
use state::{AppState, SharedState};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port: u16 = std::env::args()
        .position(|a| a == "--port")
        .and_then(|i| std::env::args().nth(i + 1))
        .and_then(|p| p.parse().ok())
        .unwrap_or(4000);

    let bind: String = std::env::args()
        .position(|a| a == "--bind")
        .and_then(|i| std::env::args().nth(i + 1))
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let token: Option<String> = std::env::args()
        .position(|a| a == "--auth")
        .and_then(|i| std::env::args().nth(i + 1));

    let state: SharedState = Arc::new(AppState::new(token));

    let app = Router::new()
        .route(
            "/{*path}",
            get(routes::read_or_subscribe)
                .put(routes::put)
                .patch(routes::patch)
                .post(routes::post)
                .delete(routes::delete),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", bind, port);
    eprintln!("arbor-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
