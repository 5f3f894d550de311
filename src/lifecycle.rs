use tokio::sync::{mpsc, oneshot};

use crate::browser::ChromeSession;
use crate::config::Config;
use crate::controller::{Command, Controller};
use crate::error::StartupError;
use crate::server;
use crate::tray::{log_to_file, TraySink};
use crate::window::WindowBridge;

/// 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl-C / SIGTERM
    Signal,
    /// CDP 연결 끊김
    BrowserDisconnected,
    /// 브라우저 프로세스 종료
    BrowserExited,
    /// 열린 페이지(창)가 하나도 없음
    WindowsClosed,
    /// 트레이 Exit 메뉴
    UserExit,
    /// 명령 채널 닫힘 (보내는 쪽이 모두 사라짐)
    Detached,
}

impl ShutdownReason {
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownReason::BrowserDisconnected => 1,
            _ => 0,
        }
    }
}

/// 종료는 한 번만 진행된다. 두 번째 요청부터는 무시.
#[derive(Debug, Default)]
pub struct Lifecycle {
    reason: Option<ShutdownReason>,
    server_stop: Option<oneshot::Sender<()>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_stop(mut self, stop: oneshot::Sender<()>) -> Self {
        self.server_stop = Some(stop);
        self
    }

    /// 처음 호출이면 true. 이미 종료 중이면 false.
    pub fn begin(&mut self, reason: ShutdownReason) -> bool {
        if self.reason.is_some() {
            return false;
        }
        self.reason = Some(reason);
        true
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason
    }

    pub fn is_shut_down(&self) -> bool {
        self.reason.is_some()
    }

    /// HTTP 리스너 정지 신호. 한 번만 보낸다.
    pub fn stop_server(&mut self) {
        if let Some(stop) = self.server_stop.take() {
            stop.send(()).ok();
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// 제어 서버 → 브라우저 → 컨트롤러 순으로 띄우고 종료될 때까지 돌린다.
/// 시작 단계 실패는 `StartupError`로 돌려주고, 호출자가 exit 1로 끝낸다.
pub async fn run_app(
    config: Config,
    tray: Box<dyn TraySink>,
    commands: mpsc::Sender<Command>,
    receiver: mpsc::Receiver<Command>,
) -> Result<ShutdownReason, StartupError> {
    // 포트가 이미 쓰이고 있으면 브라우저를 띄우기 전에 실패
    let listener = server::bind(config.control_port).await?;
    let session = ChromeSession::launch(&config, commands.clone()).await?;
    log_to_file(&format!(
        "started: url={} control={}",
        config.app_url,
        config.control_url()
    ));

    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(server::serve(listener, commands.clone(), stop_rx));
    spawn_signal_watcher(commands);

    let controller = Controller::new(
        session,
        tray,
        WindowBridge::new(config.helper_path.clone()),
        config.poll_interval(),
        Lifecycle::new().with_server_stop(stop_tx),
    );
    Ok(controller.run(receiver).await)
}

/// 종료 시그널을 기다렸다가 `Shutdown` 명령으로 바꿔 보낸다.
pub fn spawn_signal_watcher(commands: mpsc::Sender<Command>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        log::info!("종료 시그널 수신");
        commands.send(Command::Shutdown(ShutdownReason::Signal)).await.ok();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("SIGTERM 핸들러 등록 실패: {}", e);
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
