/// 브라우저 자동화 계층에서 발생하는 에러.
/// `page.rs` 경계에서 전부 false / 빈 결과로 흡수된다.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("unexpected script result: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("browser already closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// 창 숨김/표시 헬퍼 실행 실패.
#[derive(Debug, thiserror::Error)]
pub enum VisibilityError {
    #[error("failed to run helper {helper}: {source}")]
    Spawn {
        helper: String,
        #[source]
        source: std::io::Error,
    },
}

/// 시작 단계의 치명적 에러. 발생하면 전체 종료(exit 1).
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("failed to bind control server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
