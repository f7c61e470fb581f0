use std::{env, sync::Arc};

use axum::{Router, routing::post};
use http::Method;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::catalog::Catalog;

pub mod isochrones;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
}

pub async fn serve(catalog: Arc<Catalog>) {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(tower_http::cors::Any)
        .allow_headers([http::header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/api/isochrones", post(isochrones::isochrones))
        .route("/api/isochrones/score", post(isochrones::isochrones_score))
        .layer(cors)
        .with_state(AppState { catalog });

    let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());

    let bind_to = format!("[::]:{port}");
    info!("binding to {bind_to}");
    let listener = TcpListener::bind(bind_to).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
