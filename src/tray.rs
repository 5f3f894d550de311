use std::fs;
use std::thread;
use muda::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tao::event::Event;
use tao::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use tokio::sync::mpsc;
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

use crate::config::{config_dir, Config};
use crate::controller::{Command, APP_TITLE};
use crate::error::StartupError;
use crate::lifecycle::{run_app, ShutdownReason};
use crate::menu::{MenuEntry, StaticAction, TrayAction, TrayMenuModel};

// ============================================================================
// File log
// ============================================================================

/// 트레이 앱은 콘솔이 없을 수 있어서 주요 이벤트는 파일에도 남긴다
pub fn log_to_file(msg: &str) {
    use std::io::Write;
    let log_path = config_dir().join("autoprofile.log");
    if let Ok(mut f) = fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(f, "[{}] {}", now, msg).ok();
    }
}

// ============================================================================
// Tray updates (controller → main thread)
// ============================================================================

/// 컨트롤러가 메인 스레드의 트레이에 보내는 변경 사항
#[derive(Debug, Clone, PartialEq)]
pub enum TrayUpdate {
    /// 새 메뉴 스냅샷. 받을 때마다 네이티브 메뉴를 새로 만든다.
    Menu(Vec<MenuEntry>),
    Tooltip(String),
    Notify { title: String, body: String },
    /// 정상 종료 (exit code)
    Exit(i32),
    /// 시작 실패. 에러 창을 띄우고 exit 1
    Fatal(String),
}

pub trait TraySink: Send {
    fn send(&self, update: TrayUpdate);
}

impl TraySink for EventLoopProxy<TrayUpdate> {
    fn send(&self, update: TrayUpdate) {
        self.send_event(update).ok();
    }
}

#[cfg(test)]
impl TraySink for mpsc::UnboundedSender<TrayUpdate> {
    fn send(&self, update: TrayUpdate) {
        mpsc::UnboundedSender::send(self, update).ok();
    }
}

// ============================================================================
// Icon
// ============================================================================

/// 겹쳐진 프로필 카드 세 장, 가운데가 활성
pub fn load_icon() -> Result<Icon, tray_icon::BadIcon> {
    let size = 22u32;
    let mut rgba = vec![0u8; (size * size * 4) as usize];

    for y in 0..size {
        for x in 0..size {
            let idx = ((y * size + x) * 4) as usize;
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;

            let in_card = |top: f32| {
                let inside = fx >= 3.0 && fx <= 19.0 && fy >= top && fy <= top + 5.0;
                // 모서리 둥글게
                let corner = (fx < 4.0 || fx > 18.0) && (fy < top + 1.0 || fy > top + 4.0);
                inside && !corner
            };

            let color = if in_card(8.5) {
                Some([70, 200, 120, 255])
            } else if in_card(2.0) || in_card(15.0) {
                Some([150, 155, 160, 220])
            } else {
                None
            };

            if let Some(c) = color {
                rgba[idx..idx + 4].copy_from_slice(&c);
            }
        }
    }

    Icon::from_rgba(rgba, size, size)
}

// ============================================================================
// Native menu
// ============================================================================

fn build_native_menu(entries: &[MenuEntry]) -> Menu {
    let menu = Menu::new();
    for entry in entries {
        match (entry.action(), entry.label()) {
            (Some(action), Some(label)) => {
                let item = MenuItem::with_id(action.menu_id(), label, true, None);
                menu.append(&item).ok();
            }
            _ => {
                menu.append(&PredefinedMenuItem::separator()).ok();
            }
        }
    }
    menu
}

fn command_for(action: TrayAction) -> Command {
    match action {
        TrayAction::Activate(profile) => Command::Activate { profile, reply: None },
        TrayAction::Static(StaticAction::Refresh) => Command::Refresh,
        TrayAction::Static(StaticAction::ToggleWindow) => Command::ToggleWindow,
        TrayAction::Static(StaticAction::Exit) => Command::Shutdown(ShutdownReason::UserExit),
    }
}

fn show_notification(title: String, body: String) {
    thread::spawn(move || {
        if let Err(e) = notify_rust::Notification::new()
            .appname(APP_TITLE)
            .summary(&title)
            .body(&body)
            .show()
        {
            log::debug!("알림 표시 실패: {}", e);
        }
    });
}

fn show_fatal_dialog(message: &str) {
    rfd::MessageDialog::new()
        .set_title(APP_TITLE)
        .set_description(format!("시작할 수 없습니다.\n\n{}", message))
        .set_level(rfd::MessageLevel::Error)
        .show();
}

fn apply_update(tray: &TrayIcon, update: TrayUpdate, control_flow: &mut ControlFlow) {
    match update {
        TrayUpdate::Menu(entries) => {
            tray.set_menu(Some(Box::new(build_native_menu(&entries))));
        }
        TrayUpdate::Tooltip(text) => {
            tray.set_tooltip(Some(&text)).ok();
        }
        TrayUpdate::Notify { title, body } => show_notification(title, body),
        TrayUpdate::Exit(code) => {
            log_to_file(&format!("tray: exit code={}", code));
            *control_flow = ControlFlow::ExitWithCode(code);
        }
        TrayUpdate::Fatal(message) => {
            show_fatal_dialog(&message);
            *control_flow = ControlFlow::ExitWithCode(1);
        }
    }
}

// ============================================================================
// Tray App
// ============================================================================

pub fn run_tray_app(config: Config) {
    let event_loop = EventLoopBuilder::<TrayUpdate>::with_user_event().build();
    let proxy = event_loop.create_proxy();

    let mut builder = TrayIconBuilder::new()
        .with_menu(Box::new(build_native_menu(&TrayMenuModel::new().render())))
        .with_tooltip(APP_TITLE);
    match load_icon() {
        Ok(icon) => builder = builder.with_icon(icon),
        Err(e) => log::warn!("트레이 아이콘 생성 실패: {}", e),
    }
    let tray = match builder.build() {
        Ok(tray) => tray,
        Err(e) => {
            log::error!("트레이 생성 실패: {}", e);
            log_to_file(&format!("tray: build failed: {}", e));
            std::process::exit(1);
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(32);

    // 컨트롤러 + HTTP 서버 (tokio 런타임 스레드)
    let runtime_tx = cmd_tx.clone();
    let runtime_proxy = proxy.clone();
    thread::spawn(move || {
        let result = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(run_app(config, Box::new(runtime_proxy.clone()), runtime_tx, cmd_rx)),
            Err(e) => Err(StartupError::Runtime(e)),
        };
        match result {
            Ok(reason) => log::info!("컨트롤러 종료: {:?}", reason),
            Err(e) => {
                log::error!("❌ 시작 실패: {}", e);
                log_to_file(&format!("fatal: {}", e));
                runtime_proxy.send_event(TrayUpdate::Fatal(e.to_string())).ok();
            }
        }
    });

    // 메뉴 클릭 → 명령
    let menu_receiver = MenuEvent::receiver();
    thread::spawn(move || {
        while let Ok(event) = menu_receiver.recv() {
            let Some(action) = TrayAction::from_menu_id(&event.id.0) else {
                continue;
            };
            if cmd_tx.blocking_send(command_for(action)).is_err() {
                break;
            }
        }
    });

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        if let Event::UserEvent(update) = event {
            apply_update(&tray, update, control_flow);
        }
    });
}
