use crate::cli::Args;
use crate::relay::{ ChatRelay, RelayResponse };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::{ Body, Bytes },
    extract::State,
    http::{ header::CONTENT_TYPE, HeaderMap, HeaderValue },
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Router,
};
use tower_http::cors::{ Any, CorsLayer };
use log::info;

#[derive(Clone)]
struct AppState {
    relay: Arc<ChatRelay>,
}

pub fn build_router(relay: Arc<ChatRelay>, chat_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(chat_path, post(chat_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(AppState { relay })
}

pub async fn start_http_server(
    addr: SocketAddr,
    relay: Arc<ChatRelay>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = build_router(relay, &args.chat_path);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                return Err("--enable-tls requires both --tls-cert-path and --tls-key-path".into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("HTTPS server listening on: https://{}{}", addr, args.chat_path);
        axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await
            .map_err(|e| format!("Failed to bind HTTP server to {}: {}", addr, e))?;

        info!("HTTP server listening on: http://{}{}", addr, args.chat_path);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

async fn chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.relay.handle(&headers, &body).await {
        Ok(relayed) => streaming_response(relayed),
        Err(e) => e.into_response(),
    }
}

/// The persistence task keeps running on its own once the handle is dropped.
fn streaming_response(relayed: RelayResponse) -> Response {
    let mut response = Response::new(Body::from_stream(relayed.body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

async fn health_handler() -> &'static str {
    "ok"
}
