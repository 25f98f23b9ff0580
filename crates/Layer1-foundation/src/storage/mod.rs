//! Storage module for RelayCode
//!
//! - `atomic`: 원자적 파일 쓰기 (stage + rename)
//! - `json`: JSON - 범용 파일 저장/로드

mod atomic;
mod json;

// Atomic writes (태스크 문서용)
pub use atomic::{write_atomic, write_json_atomic};

// JSON Storage (범용)
pub use json::JsonStore;
