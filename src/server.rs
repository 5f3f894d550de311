use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::{Any, CorsLayer};

use crate::controller::Command;
use crate::error::StartupError;
use crate::profiles::Profile;

pub const INVALID_PORT: &str = "invalid port. use 1..5";

#[derive(Clone)]
struct ServerState {
    commands: mpsc::Sender<Command>,
}

#[derive(Deserialize)]
struct ControlRequest {
    port: Option<serde_json::Value>,
}

/// 요청 본문에서 프로필을 고른다. 정수 1..5만 허용.
fn resolve_port(body: &[u8]) -> Option<Profile> {
    let request: ControlRequest = serde_json::from_slice(body).ok()?;
    let port = request.port?.as_u64()?;
    Profile::from_port(port)
}

async fn api_control(
    State(state): State<ServerState>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(profile) = resolve_port(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": INVALID_PORT })),
        );
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .commands
        .send(Command::Activate { profile, reply: Some(reply_tx) })
        .await
        .is_ok();

    // 컨트롤러가 없으면 클릭 실패와 같게 처리
    let clicked = sent && reply_rx.await.unwrap_or(false);
    if clicked {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "status": "error" })),
        )
    }
}

fn router(commands: mpsc::Sender<Command>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/control", post(api_control))
        .layer(cors)
        .with_state(ServerState { commands })
}

pub async fn bind(port: u16) -> Result<TcpListener, StartupError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { port, source })
}

/// `stop`이 울리거나 보내는 쪽이 사라지면 리스너를 닫는다.
pub async fn serve(listener: TcpListener, commands: mpsc::Sender<Command>, stop: oneshot::Receiver<()>) {
    if let Ok(addr) = listener.local_addr() {
        log::info!("🎛️ 제어 서버 시작: http://{}/control", addr);
    }
    let result = axum::serve(listener, router(commands))
        .with_graceful_shutdown(async {
            stop.await.ok();
        })
        .await;
    match result {
        Ok(()) => log::info!("제어 서버 종료"),
        Err(e) => log::error!("제어 서버 에러: {}", e),
    }
}
