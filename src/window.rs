use std::process::Stdio;

use tokio::process::Command;

use crate::error::VisibilityError;

/// 네이티브 헬퍼(`winctl <hide|show> <pid>`)로 브라우저 창을 숨기거나 보인다.
/// 실행만 하고 기다리지 않는다. 종료 코드와 출력은 보지 않는다.
#[derive(Debug, Clone)]
pub struct WindowBridge {
    helper: String,
}

impl WindowBridge {
    pub fn new(helper: impl Into<String>) -> Self {
        Self { helper: helper.into() }
    }

    pub fn hide(&self, pid: u32) -> Result<(), VisibilityError> {
        self.run("hide", pid)
    }

    pub fn show(&self, pid: u32) -> Result<(), VisibilityError> {
        self.run("show", pid)
    }

    fn run(&self, verb: &str, pid: u32) -> Result<(), VisibilityError> {
        Command::new(&self.helper)
            .arg(verb)
            .arg(pid.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|source| VisibilityError::Spawn {
                helper: self.helper.clone(),
                source,
            })
    }
}
