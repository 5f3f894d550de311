use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::lifecycle::{Lifecycle, ShutdownReason};
use crate::menu::TrayMenuModel;
use crate::page::{self, BrowserStatus, PageDriver, ScrapeResult};
use crate::profiles::Profile;
use crate::reconcile::{Discovery, TickOutcome};
use crate::tray::{log_to_file, TraySink, TrayUpdate};
use crate::window::WindowBridge;

pub const APP_TITLE: &str = "AutoProfile";

/// 브라우저 상태 확인 주기
const WATCH_PERIOD: Duration = Duration::from_secs(1);

/// 트레이/HTTP에서 컨트롤러로 보내는 명령
#[derive(Debug)]
pub enum Command {
    Activate {
        profile: Profile,
        /// HTTP 경로는 클릭 성공 여부를 돌려받는다
        reply: Option<oneshot::Sender<bool>>,
    },
    Refresh,
    ToggleWindow,
    Shutdown(ShutdownReason),
}

// ============================================================================
// Controller
// ============================================================================

/// 메뉴 모델, 탐색 상태, 타이머, 브라우저 세션을 모두 소유한다.
/// 모든 변경은 `run` 루프 하나에서만 일어난다.
pub struct Controller<D: PageDriver> {
    page: D,
    menu: TrayMenuModel,
    discovery: Discovery,
    poll_interval: Duration,
    ticker: Option<Interval>,
    bridge: WindowBridge,
    /// 낙관적 플래그. 헬퍼가 실패해도 뒤집힌다.
    hidden: bool,
    tooltip: Option<String>,
    tray: Box<dyn TraySink>,
    lifecycle: Lifecycle,
}

impl<D: PageDriver> Controller<D> {
    pub fn new(
        page: D,
        tray: Box<dyn TraySink>,
        bridge: WindowBridge,
        poll_interval: Duration,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            page,
            menu: TrayMenuModel::new(),
            discovery: Discovery::new(),
            poll_interval,
            ticker: None,
            bridge,
            hidden: false,
            tooltip: None,
            tray,
            lifecycle,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> ShutdownReason {
        self.start().await;

        let mut watch = tokio::time::interval_at(Instant::now() + WATCH_PERIOD, WATCH_PERIOD);
        watch.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.lifecycle.is_shut_down() {
            tokio::select! {
                _ = next_tick(&mut self.ticker) => self.poll_tick().await,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => self.shutdown(ShutdownReason::Detached).await,
                },
                _ = watch.tick() => self.check_browser().await,
            }
        }

        self.lifecycle.reason().unwrap_or(ShutdownReason::Detached)
    }

    /// 초기 메뉴 표시, 동기 1회 시도, 아직 못 찾았으면 폴링 타이머 시작
    async fn start(&mut self) {
        self.tray.send(TrayUpdate::Menu(self.menu.render()));
        self.poll_tick().await;
        if !self.discovery.is_settled() {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
        }
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Activate { profile, reply } => {
                let ok = self.activate(profile).await;
                if let Some(reply) = reply {
                    reply.send(ok).ok();
                }
            }
            Command::Refresh => {
                self.reconcile().await;
            }
            Command::ToggleWindow => self.toggle_window(),
            Command::Shutdown(reason) => self.shutdown(reason).await,
        }
    }

    // ------------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------------

    /// 이름을 다시 긁어 메뉴에 반영한다. 라벨이 바뀐 경우에만 메뉴를 다시 그린다.
    async fn reconcile(&mut self) -> ScrapeResult {
        let scrape = page::scrape_profiles(&self.page).await;
        if self.menu.update(&scrape.names) {
            log::debug!("메뉴 갱신: {:?}", scrape.names);
            self.tray.send(TrayUpdate::Menu(self.menu.render()));
        }
        if let Some(active) = scrape.active.as_deref().and_then(Profile::from_dom_id) {
            self.set_tooltip(active);
        }
        scrape
    }

    async fn poll_tick(&mut self) {
        if self.discovery.is_settled() {
            return;
        }
        self.reconcile().await;

        let names_loaded = self.menu.has_loaded_names();
        let active = if names_loaded {
            page::detect_active_profile(&self.page).await
        } else {
            None
        };

        match self.discovery.advance(names_loaded, active) {
            TickOutcome::Settled(profile) => {
                // 초기 탐색 타이머는 여기서 한 번만 취소된다
                self.ticker = None;
                let label = self.menu.label_of(profile).to_string();
                log::info!("활성 프로필 확인: {} ({})", label, profile);
                log_to_file(&format!("settled: active={} label={}", profile, label));
                self.set_tooltip(profile);
                self.notify(format!("Started. Active profile: {}", label));
            }
            TickOutcome::AwaitingNames => log::debug!("프로필 이름 대기 중"),
            TickOutcome::AwaitingActive => log::debug!("활성 프로필 대기 중"),
            TickOutcome::Idle => {}
        }
    }

    // ------------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------------

    /// 프로필 클릭 → 재동기화 → 알림. 클릭 성공 여부를 돌려준다.
    pub async fn activate(&mut self, profile: Profile) -> bool {
        let ok = page::click_by_id(&self.page, profile.dom_id()).await;
        self.reconcile().await;

        let label = self.menu.label_of(profile).to_string();
        if ok {
            log::info!("프로필 전환: {} ({})", label, profile);
            self.set_tooltip(profile);
            self.notify(format!("Switched to {}", label));
        } else {
            log::error!("프로필 전환 실패: {} ({})", label, profile);
            self.notify(format!("Could not switch to {}", label));
        }
        ok
    }

    fn toggle_window(&mut self) {
        let Some(pid) = self.page.browser_pid() else {
            log::warn!("브라우저 pid를 몰라 창을 숨기거나 보일 수 없음");
            return;
        };
        let result = if self.hidden {
            self.bridge.show(pid)
        } else {
            self.bridge.hide(pid)
        };
        // 헬퍼 실패는 무시한다. 플래그는 실제 창 상태와 어긋날 수 있다.
        if let Err(e) = result {
            log::debug!("창 헬퍼 실패 (무시): {}", e);
        }
        self.hidden = !self.hidden;
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    async fn check_browser(&mut self) {
        match self.page.status().await {
            BrowserStatus::Running => {}
            BrowserStatus::Exited => self.shutdown(ShutdownReason::BrowserExited).await,
            BrowserStatus::NoWindows => self.shutdown(ShutdownReason::WindowsClosed).await,
        }
    }

    /// 타이머 정지 → HTTP 정지 → 브라우저 종료 → 트레이 루프 종료.
    /// 두 번째 호출부터는 아무것도 닫지 않는다.
    pub async fn shutdown(&mut self, reason: ShutdownReason) {
        if !self.lifecycle.begin(reason) {
            log::debug!("이미 종료 중 ({:?} 무시)", reason);
            return;
        }
        log::info!("종료: {:?}", reason);
        log_to_file(&format!("shutdown: {:?}", reason));

        self.ticker = None;
        self.lifecycle.stop_server();
        if let Err(e) = self.page.close().await {
            log::warn!("브라우저 종료 실패: {}", e);
        }
        self.tray.send(TrayUpdate::Exit(reason.exit_code()));
    }

    // ------------------------------------------------------------------------

    fn set_tooltip(&mut self, profile: Profile) {
        let tooltip = format!("{} - {}", APP_TITLE, self.menu.label_of(profile));
        if self.tooltip.as_deref() != Some(tooltip.as_str()) {
            self.tray.send(TrayUpdate::Tooltip(tooltip.clone()));
            self.tooltip = Some(tooltip);
        }
    }

    fn notify(&self, body: String) {
        self.tray.send(TrayUpdate::Notify {
            title: APP_TITLE.to_string(),
            body,
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
