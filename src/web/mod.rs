use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Json, Response},
    routing::get,
    Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{debug, info, Level};

use crate::config::ServerConfig;
use crate::models::Item;
use crate::store::ItemStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ItemStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(websocket_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "terawatch"
    }))
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Feeds one observer: the current snapshot immediately on connect, then the
/// full snapshot again after every refresh until the connection goes away.
/// Any write failure tears this connection down and removes its
/// registration; other observers are unaffected.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut source) = socket.split();

    if send_snapshot(&mut sink, &state.store.items()).await.is_err() {
        debug!("disconnecting observer: could not send initial items");
        return;
    }

    let mut subscription = state.store.subscribe().await;
    let subscription_id = subscription.id();
    debug!("observer connected as subscriber {subscription_id}");

    loop {
        tokio::select! {
            snapshot = subscription.recv() => {
                let Some(snapshot) = snapshot else { break };
                debug!("sending {} items to subscriber {subscription_id}", snapshot.len());
                if send_snapshot(&mut sink, &snapshot).await.is_err() {
                    debug!("disconnecting subscriber {subscription_id}: write failed");
                    break;
                }
            }
            message = source.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Pings are answered by axum; other client messages are
                    // ignored, this endpoint only produces
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.store.unsubscribe(subscription_id).await;
    debug!("observer {subscription_id} disconnected");
}

async fn send_snapshot(
    sink: &mut SplitSink<WebSocket, Message>,
    items: &[Item],
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(items)?;
    sink.send(Message::Text(payload)).await?;
    Ok(())
}

pub async fn serve(config: &ServerConfig, store: Arc<ItemStore>) -> anyhow::Result<()> {
    let app = create_router(AppState { store });

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    info!("Server starting on {}:{}", config.host, config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
