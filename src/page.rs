use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use crate::error::AutomationError;
use crate::profiles::Profile;

pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// 브라우저 프로세스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserStatus {
    Running,
    /// 프로세스 종료
    Exited,
    /// 프로세스는 살아있지만 열린 페이지가 없음
    NoWindows,
}

/// 자동화된 페이지에 대한 추상 연결.
///
/// 실제 구현은 `browser::ChromeSession`이며, DOM 로직은 이 트레이트만 보고
/// 동작하므로 테스트에서 가짜 페이지로 바꿔 끼울 수 있다.
pub trait PageDriver {
    /// JS 표현식을 평가하고 JSON 값으로 돌려준다.
    fn evaluate(&self, script: String) -> PageFuture<'_, Result<serde_json::Value, AutomationError>>;

    /// 창 숨김/표시에 쓰이는 브라우저 프로세스 pid
    fn browser_pid(&self) -> Option<u32>;

    fn status(&mut self) -> PageFuture<'_, BrowserStatus>;

    /// 브라우저 종료. 두 번째 호출부터는 아무것도 하지 않는다.
    fn close(&mut self) -> PageFuture<'_, Result<(), AutomationError>>;
}

// ============================================================================
// Page Action Executor
// ============================================================================

fn click_script(id: &str) -> String {
    // serde_json 문자열 리터럴은 그대로 JS 문자열 리터럴로 쓸 수 있다
    let literal = serde_json::Value::String(id.to_string()).to_string();
    format!(
        "(() => {{ const el = document.getElementById({}); if (!el) return false; el.click(); return true; }})()",
        literal
    )
}

/// id로 요소를 찾아 클릭한다. 요소가 없거나 자동화 에러면 false.
pub async fn click_by_id<D: PageDriver + ?Sized>(page: &D, id: &str) -> bool {
    match page.evaluate(click_script(id)).await {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(e) => {
            log::warn!("클릭 실패 #{}: {}", id, e);
            false
        }
    }
}

// ============================================================================
// Profile Name Scraper
// ============================================================================

const SCRAPE_SCRIPT: &str = r#"(() => Array.from(document.querySelectorAll('.profileName')).map(el => ({
    id: el.getAttribute('for'),
    name: (el.textContent || '').trim(),
    active: el.classList.contains('active'),
})))()"#;

#[derive(Debug, Deserialize)]
struct ProfileNameRecord {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    active: bool,
}

/// 한 번의 스크랩 결과. 저장하지 않는다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeResult {
    pub names: HashMap<String, String>,
    pub active: Option<String>,
}

impl ScrapeResult {
    /// 문서 순서대로 접는다. 같은 id는 뒤의 것이, active도 마지막 것이 이긴다.
    fn from_records(records: Vec<ProfileNameRecord>) -> Self {
        let mut result = ScrapeResult::default();
        for record in records {
            let Some(id) = record.id.filter(|id| !id.is_empty()) else {
                continue;
            };
            if record.active {
                result.active = Some(id.clone());
            }
            if !record.name.is_empty() {
                result.names.insert(id, record.name);
            }
        }
        result
    }
}

pub async fn scrape_profiles<D: PageDriver + ?Sized>(page: &D) -> ScrapeResult {
    let value = match page.evaluate(SCRAPE_SCRIPT.to_string()).await {
        Ok(v) => v,
        Err(e) => {
            log::debug!("프로필 이름 스크랩 실패: {}", e);
            return ScrapeResult::default();
        }
    };
    match serde_json::from_value::<Vec<ProfileNameRecord>>(value) {
        Ok(records) => ScrapeResult::from_records(records),
        Err(e) => {
            log::debug!("스크랩 결과 형식 오류: {}", e);
            ScrapeResult::default()
        }
    }
}

// ============================================================================
// Activity Detector
// ============================================================================

const OFFSET_SCRIPT: &str =
    "getComputedStyle(document.documentElement).getPropertyValue('--translateY')";

/// `--translateY` 값("200%" 등)을 오프셋 인덱스로 바꾼다.
/// 반올림은 브라우저 `Math.round`와 같이 .5를 +무한대 쪽으로 올린다.
pub fn offset_index(raw: &str) -> Option<i64> {
    let number = raw.trim().trim_end_matches('%').trim();
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let index = (value / 100.0 + 0.5).floor();
    Some(index as i64)
}

/// 페이지에서 현재 활성 프로필을 읽는다. 못 읽으면 None.
pub async fn detect_active_profile<D: PageDriver + ?Sized>(page: &D) -> Option<Profile> {
    let value = match page.evaluate(OFFSET_SCRIPT.to_string()).await {
        Ok(v) => v,
        Err(e) => {
            log::debug!("--translateY 읽기 실패: {}", e);
            return None;
        }
    };
    let raw = value.as_str()?;
    offset_index(raw).and_then(Profile::from_offset_index)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    /// 스크립트 종류별로 정해진 값을 돌려주는 가짜 페이지.
    /// 상태는 Rc로 공유되어 드라이버를 넘긴 뒤에도 테스트가 바꾸고 관찰할 수 있다.
    #[derive(Clone, Default)]
    pub struct FakePage {
        pub state: Rc<FakeState>,
    }

    #[derive(Default)]
    pub struct FakeState {
        pub records: RefCell<Option<serde_json::Value>>,
        pub offset: RefCell<Option<String>>,
        pub clickable: RefCell<Vec<String>>,
        pub clicks: RefCell<Vec<String>>,
        pub scrapes: Cell<usize>,
        pub closes: Cell<usize>,
        pub status: Cell<Option<BrowserStatus>>,
        pub broken: Cell<bool>,
    }

    impl FakePage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_names(&self, names: &[(&str, &str)], active: Option<&str>) {
            let records: Vec<serde_json::Value> = names
                .iter()
                .map(|(id, name)| {
                    serde_json::json!({ "id": id, "name": name, "active": Some(*id) == active })
                })
                .collect();
            *self.state.records.borrow_mut() = Some(serde_json::Value::Array(records));
        }

        pub fn set_offset(&self, raw: &str) {
            *self.state.offset.borrow_mut() = Some(raw.to_string());
        }

        pub fn allow_click(&self, id: &str) {
            self.state.clickable.borrow_mut().push(id.to_string());
        }

        pub fn clicks(&self) -> Vec<String> {
            self.state.clicks.borrow().clone()
        }
    }

    impl PageDriver for FakePage {
        fn evaluate(&self, script: String) -> PageFuture<'_, Result<serde_json::Value, AutomationError>> {
            Box::pin(async move {
                if self.state.broken.get() {
                    return Err(AutomationError::Other("target crashed".into()));
                }
                if script.contains("getElementById") {
                    let clickable = self.state.clickable.borrow();
                    let hit = clickable.iter().find(|id| script.contains(&format!("\"{}\"", id)));
                    return Ok(match hit {
                        Some(id) => {
                            self.state.clicks.borrow_mut().push(id.clone());
                            serde_json::Value::Bool(true)
                        }
                        None => serde_json::Value::Bool(false),
                    });
                }
                if script.contains(".profileName") {
                    self.state.scrapes.set(self.state.scrapes.get() + 1);
                    return Ok(self
                        .state
                        .records
                        .borrow()
                        .clone()
                        .unwrap_or_else(|| serde_json::json!([])));
                }
                if script.contains("--translateY") {
                    return Ok(serde_json::Value::String(
                        self.state.offset.borrow().clone().unwrap_or_default(),
                    ));
                }
                Err(AutomationError::Other(format!("unexpected script: {}", script)))
            })
        }

        fn browser_pid(&self) -> Option<u32> {
            Some(4242)
        }

        fn status(&mut self) -> PageFuture<'_, BrowserStatus> {
            let status = self.state.status.get().unwrap_or(BrowserStatus::Running);
            Box::pin(async move { status })
        }

        fn close(&mut self) -> PageFuture<'_, Result<(), AutomationError>> {
            self.state.closes.set(self.state.closes.get() + 1);
            Box::pin(async { Ok(()) })
        }
    }
}
