use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use crate::client::ControlClient;
use crate::config::Config;

/// 포그라운드 확인 주기
pub const CHECK_INTERVAL: Duration = Duration::from_millis(250);
/// 지정된 앱이 아닐 때 보내는 포트 (Default 프로필)
pub const FALLBACK_PORT: u64 = 1;

// ============================================================================
// Seams
// ============================================================================

/// 현재 포그라운드 창의 실행 파일 이름
pub trait ForegroundSource {
    fn foreground_exe(&mut self) -> Option<String>;
}

/// `/control`로 포트를 보낸다. 200이면 true.
pub trait PortSender {
    fn send(&self, port: u64) -> bool;
}

impl PortSender for ControlClient {
    fn send(&self, port: u64) -> bool {
        match self.send_port(port) {
            Ok((200, _)) => true,
            Ok((status, body)) => {
                log::warn!("port {} 거절됨: {} {}", port, status, body);
                false
            }
            Err(e) => {
                log::warn!("port {} 전송 실패: {}", port, e);
                false
            }
        }
    }
}

/// 경로를 떼고 소문자로 바꾼 실행 파일 이름
pub fn normalize_exe(name: &str) -> String {
    name.trim()
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// 포그라운드 앱에 지정된 포트. 없으면 `FALLBACK_PORT`.
pub fn select_port(exe: Option<&str>, assignments: &BTreeMap<String, u64>) -> u64 {
    exe.map(normalize_exe)
        .and_then(|exe| assignments.get(&exe).copied())
        .unwrap_or(FALLBACK_PORT)
}

// ============================================================================
// Watcher
// ============================================================================

/// 포그라운드 앱이 바뀌어 고른 포트가 달라질 때만 보낸다.
pub struct Watcher<F, S> {
    source: F,
    sender: S,
    assignments: BTreeMap<String, u64>,
    last_sent: Option<u64>,
}

impl<F: ForegroundSource, S: PortSender> Watcher<F, S> {
    pub fn new(source: F, sender: S, assignments: BTreeMap<String, u64>) -> Self {
        Self {
            source,
            sender,
            assignments,
            last_sent: None,
        }
    }

    /// 한 번 확인한다. 새로 보낸 포트가 있으면 돌려준다.
    /// 전송 실패여도 같은 포트를 다시 보내지 않는다.
    pub fn tick(&mut self) -> Option<u64> {
        let exe = self.source.foreground_exe();
        let port = select_port(exe.as_deref(), &self.assignments);
        if self.last_sent == Some(port) {
            return None;
        }
        if port == FALLBACK_PORT {
            log::info!("지정 앱 아님 ({:?}) → fallback port {}", exe, port);
        } else {
            log::info!("{:?} → port {}", exe, port);
        }
        self.sender.send(port);
        self.last_sent = Some(port);
        Some(port)
    }
}

/// `--watch` 모드. 프로세스가 끝날 때까지 돈다.
pub fn run_watch(config: &Config) -> ! {
    if config.app_ports.is_empty() {
        log::warn!("지정된 앱이 없어 항상 port {}를 보냅니다 (--assign 참고)", FALLBACK_PORT);
    }
    if !cfg!(windows) {
        log::warn!("이 플랫폼에서는 포그라운드 앱을 알 수 없습니다");
    }
    println!("👀 watching → {}", config.control_url());

    let mut watcher = Watcher::new(
        SystemForeground::default(),
        ControlClient::new(&config.control_url()),
        config.app_ports.clone(),
    );
    loop {
        if let Some(port) = watcher.tick() {
            println!("➡️ port {}", port);
        }
        thread::sleep(CHECK_INTERVAL);
    }
}

// ============================================================================
// Foreground window (platform)
// ============================================================================

/// 창 핸들이 바뀔 때만 프로세스를 다시 조회한다
#[derive(Debug, Default)]
pub struct SystemForeground {
    last_window: Option<isize>,
    last_exe: Option<String>,
}

impl ForegroundSource for SystemForeground {
    fn foreground_exe(&mut self) -> Option<String> {
        let Some(window) = platform::foreground_window() else {
            self.last_window = None;
            self.last_exe = None;
            return None;
        };
        if self.last_window != Some(window) {
            self.last_window = Some(window);
            self.last_exe = platform::exe_of_window(window).map(|path| normalize_exe(&path));
        }
        self.last_exe.clone()
    }
}

#[cfg(windows)]
mod platform {
    use windows::core::PWSTR;
    use windows::Win32::Foundation::{CloseHandle, FALSE, HWND};
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_FORMAT,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

    pub fn foreground_window() -> Option<isize> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            None
        } else {
            Some(hwnd.0 as isize)
        }
    }

    pub fn exe_of_window(window: isize) -> Option<String> {
        unsafe {
            let mut pid: u32 = 0;
            GetWindowThreadProcessId(HWND(window as *mut core::ffi::c_void), Some(&mut pid));
            if pid == 0 {
                return None;
            }
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid).ok()?;
            let mut buf = [0u16; 260];
            let mut len = buf.len() as u32;
            let queried = QueryFullProcessImageNameW(
                handle,
                PROCESS_NAME_FORMAT(0),
                PWSTR(buf.as_mut_ptr()),
                &mut len,
            );
            let _ = CloseHandle(handle);
            queried.ok()?;
            Some(String::from_utf16_lossy(&buf[..len as usize]))
        }
    }
}

#[cfg(not(windows))]
mod platform {
    pub fn foreground_window() -> Option<isize> {
        None
    }

    pub fn exe_of_window(_window: isize) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    struct Scripted(VecDeque<Option<&'static str>>);

    impl ForegroundSource for Scripted {
        fn foreground_exe(&mut self) -> Option<String> {
            self.0.pop_front().flatten().map(String::from)
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Rc<RefCell<Vec<u64>>>,
        accept: bool,
    }

    impl PortSender for Recorder {
        fn send(&self, port: u64) -> bool {
            self.sent.borrow_mut().push(port);
            self.accept
        }
    }

    fn assignments() -> BTreeMap<String, u64> {
        BTreeMap::from([("game.exe".to_string(), 3), ("editor.exe".to_string(), 5)])
    }

    #[test]
    fn exe_names_are_normalized() {
        assert_eq!(normalize_exe(r"C:\Games\Game.EXE"), "game.exe");
        assert_eq!(normalize_exe("/usr/bin/Editor.exe "), "editor.exe");
        assert_eq!(normalize_exe("plain.exe"), "plain.exe");
    }

    #[test]
    fn unassigned_or_missing_app_falls_back() {
        let table = assignments();
        assert_eq!(select_port(Some(r"D:\x\GAME.exe"), &table), 3);
        assert_eq!(select_port(Some("browser.exe"), &table), FALLBACK_PORT);
        assert_eq!(select_port(None, &table), FALLBACK_PORT);
    }

    #[test]
    fn sends_only_when_port_changes() {
        let script = VecDeque::from(vec![
            Some("game.exe"),
            Some("game.exe"),
            Some("browser.exe"),
            None,
            Some("editor.exe"),
            Some("game.exe"),
            Some("game.exe"),
        ]);
        let recorder = Recorder { accept: true, ..Recorder::default() };
        let mut watcher = Watcher::new(Scripted(script), recorder.clone(), assignments());

        let ticks: Vec<Option<u64>> = (0..7).map(|_| watcher.tick()).collect();
        assert_eq!(
            ticks,
            vec![Some(3), None, Some(FALLBACK_PORT), None, Some(5), Some(3), None]
        );
        assert_eq!(*recorder.sent.borrow(), vec![3, 1, 5, 3]);
    }

    #[test]
    fn failed_send_is_not_retried() {
        let recorder = Recorder::default();
        let script = VecDeque::from(vec![None, None, None]);
        let mut watcher = Watcher::new(Scripted(script), recorder.clone(), BTreeMap::new());

        for _ in 0..3 {
            watcher.tick();
        }
        assert_eq!(*recorder.sent.borrow(), vec![FALLBACK_PORT]);
    }
}
