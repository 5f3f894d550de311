use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::controller::Command;
use crate::error::{AutomationError, StartupError};
use crate::lifecycle::ShutdownReason;
use crate::page::{BrowserStatus, PageDriver, PageFuture};

const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// chromiumoxide로 띄운 브라우저와 그 안의 패널 페이지
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Page,
    /// 앱 페이지(탭)의 타깃 id. 이 탭이 닫히면 창이 닫힌 것으로 본다.
    target: TargetId,
    pid: Option<u32>,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    /// 브라우저를 띄우고 `app_url`을 연다.
    /// CDP 연결이 끊기면 `Shutdown(BrowserDisconnected)`을 보낸다.
    pub async fn launch(config: &Config, commands: mpsc::Sender<Command>) -> Result<Self, StartupError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(config.user_data_dir())
            .window_size(config.window_width, config.window_height)
            .viewport(None)
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.browser_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(StartupError::Launch)?;

        let (mut browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| StartupError::Launch(e.to_string()))?;
        let handler = tokio::spawn(handler_loop(handler, commands));

        let pid = browser
            .get_mut_child()
            .and_then(|child| child.as_mut_inner().id());

        let page = match browser.new_page(config.app_url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.kill().await;
                handler.abort();
                return Err(StartupError::Launch(format!("{}: {}", config.app_url, e)));
            }
        };
        log::info!("🌐 브라우저 시작: {} (pid {:?})", config.app_url, pid);

        Ok(Self {
            browser: Some(browser),
            target: page.target_id().clone(),
            page,
            pid,
            handler,
        })
    }
}

/// 웹소켓/IO 에러만 연결이 끊긴 것으로 본다. 나머지(파싱 실패 등)는 메시지 하나의 문제.
fn is_connection_lost(err: &CdpError) -> bool {
    matches!(err, CdpError::Ws(_) | CdpError::Io(_))
}

/// CDP 핸들러를 끝까지 돌린다. 스트림이 끝나거나 연결이 끊기면 종료 명령을 보낸다.
async fn handler_loop<S>(mut handler: S, commands: mpsc::Sender<Command>)
where
    S: Stream<Item = Result<(), CdpError>> + Unpin,
{
    while let Some(event) = handler.next().await {
        match event {
            Ok(()) => {}
            Err(e) if is_connection_lost(&e) => {
                log::warn!("CDP 연결 에러: {}", e);
                break;
            }
            Err(e) => log::warn!("CDP 핸들러 에러 (계속): {}", e),
        }
    }
    log::info!("CDP 연결 종료");
    commands
        .send(Command::Shutdown(ShutdownReason::BrowserDisconnected))
        .await
        .ok();
}

/// 앱 탭이 열린 타깃 목록에 없으면 `NoWindows`
fn app_page_status<T: PartialEq>(open: &[T], app: &T) -> BrowserStatus {
    if open.contains(app) {
        BrowserStatus::Running
    } else {
        BrowserStatus::NoWindows
    }
}

impl PageDriver for ChromeSession {
    fn evaluate(&self, script: String) -> PageFuture<'_, Result<serde_json::Value, AutomationError>> {
        Box::pin(async move {
            if self.browser.is_none() {
                return Err(AutomationError::Closed);
            }
            let result = tokio::time::timeout(EVAL_TIMEOUT, self.page.evaluate(script))
                .await
                .map_err(|_| AutomationError::Other("evaluation timed out".into()))??;
            Ok(result.into_value::<serde_json::Value>()?)
        })
    }

    fn browser_pid(&self) -> Option<u32> {
        self.pid
    }

    fn status(&mut self) -> PageFuture<'_, BrowserStatus> {
        Box::pin(async move {
            let Some(browser) = self.browser.as_mut() else {
                return BrowserStatus::Exited;
            };
            match browser.try_wait() {
                Ok(Some(status)) => {
                    log::info!("브라우저 프로세스 종료: {}", status);
                    return BrowserStatus::Exited;
                }
                Ok(None) => {}
                Err(e) => log::debug!("브라우저 상태 확인 실패: {}", e),
            }
            match browser.pages().await {
                Ok(pages) => {
                    let open: Vec<TargetId> = pages.iter().map(|p| p.target_id().clone()).collect();
                    app_page_status(&open, &self.target)
                }
                Err(e) => {
                    log::debug!("페이지 목록 조회 실패: {}", e);
                    BrowserStatus::Running
                }
            }
        })
    }

    fn close(&mut self) -> PageFuture<'_, Result<(), AutomationError>> {
        Box::pin(async move {
            let Some(mut browser) = self.browser.take() else {
                return Ok(());
            };
            let closed = browser.close().await;
            if closed.is_err() {
                let _ = browser.kill().await;
            }
            browser.wait().await.ok();
            self.handler.abort();
            closed.map(drop).map_err(AutomationError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error() -> CdpError {
        CdpError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
    }

    #[test]
    fn only_transport_errors_end_the_session() {
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(is_connection_lost(&CdpError::from(reset)));
        assert!(!is_connection_lost(&parse_error()));
        assert!(!is_connection_lost(&CdpError::NoResponse));
        assert!(!is_connection_lost(&CdpError::Timeout));
    }

    #[tokio::test]
    async fn bad_message_keeps_handler_running() {
        let (tx, mut rx) = mpsc::channel(4);
        // 파싱 실패 뒤에도 이벤트를 계속 소비하다가 스트림 끝에서 종료
        let events = futures::stream::iter(vec![Ok(()), Err(parse_error()), Ok(()), Ok(())]);
        let consumed = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = consumed.clone();
        let events = events.inspect(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        handler_loop(events, tx).await;
        assert_eq!(consumed.load(std::sync::atomic::Ordering::SeqCst), 4);
        assert!(matches!(
            rx.recv().await,
            Some(Command::Shutdown(ShutdownReason::BrowserDisconnected))
        ));
    }

    #[tokio::test]
    async fn transport_error_reports_disconnect() {
        let (tx, mut rx) = mpsc::channel(4);
        let reset = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        let events = futures::stream::iter(vec![Ok(()), Err(CdpError::from(reset))])
            .chain(futures::stream::pending());

        // pending 뒤로는 가지 않고 에러에서 바로 빠져나와야 한다
        handler_loop(events, tx).await;
        assert!(matches!(
            rx.recv().await,
            Some(Command::Shutdown(ShutdownReason::BrowserDisconnected))
        ));
    }

    #[test]
    fn closing_app_tab_counts_as_window_closed() {
        let app = "APP".to_string();
        let newtab = "NEWTAB".to_string();
        assert_eq!(app_page_status(&[newtab.clone(), app.clone()], &app), BrowserStatus::Running);
        assert_eq!(app_page_status(&[newtab], &app), BrowserStatus::NoWindows);
        assert_eq!(app_page_status::<String>(&[], &app), BrowserStatus::NoWindows);
    }
}
