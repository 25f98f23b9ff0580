//! # relay-foundation
//!
//! Foundation layer for RelayCode:
//! - Error: 중앙 에러 타입 (Error, Result)
//! - Config: 통합 설정 (RelayConfig, AgentConfig, BridgeConfig)
//! - Storage: 원자적 파일 쓰기 + JsonStore (설정 저장용)
//! - Process: PID 생존 확인
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  relay-cli (dispatch / status / answer ...) │
//! │                     │                       │
//! │                     ▼                       │
//! │  relay-bridge (supervisor + task store)     │
//! │                     │                       │
//! │                     ▼                       │
//! │  relay-foundation (config, storage, error)  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod process;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{AgentConfig, BridgeConfig, RelayConfig, RELAY_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{write_atomic, write_json_atomic, JsonStore};

// ============================================================================
// Process (프로세스 생존 확인)
// ============================================================================
pub use process::pid_alive;
