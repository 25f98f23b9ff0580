//! Error types for RelayCode
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// RelayCode 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 저장소 관련
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    // ========================================================================
    // Dispatch 관련
    // ========================================================================
    #[error("Working directory does not exist: {0}")]
    WorkdirMissing(String),

    #[error("Supervisor launch failed: {0}")]
    LaunchFailed(String),

    // ========================================================================
    // Agent 관련
    // ========================================================================
    #[error("Agent error: {0}")]
    Agent(String),

    // ========================================================================
    // 실행 관련
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::TaskNotFound(_)
                | Error::DuplicateTask(_)
                | Error::InvalidTaskId(_)
                | Error::WorkdirMissing(_)
                | Error::InvalidInput(_)
                | Error::Cancelled
        )
    }

    /// 터미널 상태 detail 문자열로 축약
    pub fn detail(&self) -> String {
        match self {
            Error::Agent(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
