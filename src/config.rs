use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::profiles::Profile;
use crate::watcher::normalize_exe;

pub const DEFAULT_APP_URL: &str = "http://localhost:5173/";
/// 폴링 주기 상한 (1시간)
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 자동화 브라우저가 여는 페이지
    pub app_url: String,
    /// `POST /control` 리스너 포트
    pub control_port: u16,
    pub poll_interval_secs: u64,
    /// `winctl` 헬퍼 경로
    pub helper_path: String,
    pub headless: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    /// `--watch` 모드: 실행 파일 이름(소문자) → 제어 포트(1..5)
    pub app_ports: BTreeMap<String, u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            control_port: 3000,
            poll_interval_secs: 3,
            helper_path: default_helper().to_string(),
            headless: false,
            browser_path: None,
            user_data_dir: None,
            window_width: 1280,
            window_height: 800,
            app_ports: BTreeMap::new(),
        }
    }
}

#[cfg(windows)]
fn default_helper() -> &'static str {
    "winctl.exe"
}

#[cfg(not(windows))]
fn default_helper() -> &'static str {
    "winctl"
}

pub fn config_dir() -> PathBuf {
    let dir = ProjectDirs::from("com", "autoprofile", "tray")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("autoprofile"));
    fs::create_dir_all(&dir).ok();
    dir
}

impl Config {
    pub fn config_path() -> PathBuf {
        config_dir().join("config.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// 파일이 없거나 깨졌으면 기본값
    pub fn load_from(path: &Path) -> Self {
        let config: Self = if let Ok(data) = fs::read_to_string(path) {
            serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("설정 파일 파싱 실패 ({}), 기본값 사용: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        };
        config.sanitized()
    }

    pub fn save(&self) {
        self.save_to(&Self::config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Ok(data) = serde_json::to_string_pretty(self) {
            fs::write(path, data).ok();
        }
    }

    /// 잘못된 URL과 범위 밖 주기를 바로잡는다
    pub fn sanitized(mut self) -> Self {
        if url::Url::parse(&self.app_url).is_err() {
            log::warn!("잘못된 app_url \"{}\", 기본값 사용", self.app_url);
            self.app_url = DEFAULT_APP_URL.to_string();
        }
        self.poll_interval_secs = self.poll_interval_secs.clamp(1, MAX_POLL_INTERVAL_SECS);
        self.app_ports = std::mem::take(&mut self.app_ports)
            .into_iter()
            .filter(|(_, port)| Profile::from_port(*port).is_some())
            .map(|(exe, port)| (normalize_exe(&exe), port))
            .filter(|(exe, _)| !exe.is_empty())
            .collect();
        self
    }

    /// 프로필 하나에는 앱 하나. 같은 포트에 지정된 이전 앱은 지운다.
    pub fn assign(&mut self, exe: &str, port: u64) -> bool {
        let exe = normalize_exe(exe);
        if exe.is_empty() || Profile::from_port(port).is_none() {
            return false;
        }
        self.app_ports.retain(|_, p| *p != port);
        self.app_ports.insert(exe, port);
        true
    }

    pub fn unassign(&mut self, exe: &str) -> bool {
        self.app_ports.remove(&normalize_exe(exe)).is_some()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.clamp(1, MAX_POLL_INTERVAL_SECS))
    }

    pub fn user_data_dir(&self) -> PathBuf {
        self.user_data_dir
            .clone()
            .unwrap_or_else(|| config_dir().join("chrome-profile"))
    }

    pub fn control_url(&self) -> String {
        format!("http://localhost:{}/control", self.control_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.control_port, 3000);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            app_url: "http://127.0.0.1:8080/panel".into(),
            control_port: 3100,
            headless: true,
            ..Config::default()
        };
        config.save_to(&path);
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "control_port": 4000, "poll_interval_secs": 0 }"#).unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.control_port, 4000);
        assert_eq!(config.poll_interval_secs, 1);
        assert_eq!(config.app_url, DEFAULT_APP_URL);
    }

    #[test]
    fn huge_poll_interval_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "poll_interval_secs": 18446744073709551615 }"#).unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.poll_interval_secs, MAX_POLL_INTERVAL_SECS);

        // 타이머 시작 시각 계산이 넘치지 않아야 한다
        let start = std::time::Instant::now() + config.poll_interval();
        assert!(start > std::time::Instant::now());

        let unsanitized = Config {
            poll_interval_secs: u64::MAX,
            ..Config::default()
        };
        assert_eq!(unsanitized.poll_interval(), Duration::from_secs(MAX_POLL_INTERVAL_SECS));
    }

    #[test]
    fn app_ports_are_cleaned_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "app_ports": { "C:\\Games\\Game.EXE": 3, "bad.exe": 9, "": 2 } }"#,
        )
        .unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.app_ports, BTreeMap::from([("game.exe".to_string(), 3)]));
    }

    #[test]
    fn assign_keeps_one_app_per_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();

        assert!(config.assign("Game.exe", 3));
        assert!(config.assign("editor.exe", 5));
        assert!(config.assign("other.exe", 3));
        assert!(!config.assign("x.exe", 0));
        assert!(!config.assign("", 2));
        assert_eq!(
            config.app_ports,
            BTreeMap::from([("editor.exe".to_string(), 5), ("other.exe".to_string(), 3)])
        );

        assert!(config.unassign("EDITOR.EXE"));
        assert!(!config.unassign("editor.exe"));

        config.save_to(&path);
        assert_eq!(Config::load_from(&path).app_ports, config.app_ports);
    }

    #[test]
    fn bad_url_and_garbage_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "app_url": "not a url" }"#).unwrap();
        assert_eq!(Config::load_from(&path).app_url, DEFAULT_APP_URL);

        fs::write(&path, "{{{").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
