//! # relay-bridge
//!
//! Bridge layer for RelayCode:
//! - Store: 태스크 디렉토리 레이아웃 + 원자적 문서 읽기/쓰기
//! - Agent: stream-json 세션 프로토콜 (spawn, 이벤트 파싱, control 응답)
//! - Supervisor: 세션 하나를 끝까지 모는 상태 기계
//! - Dispatch: supervisor를 detach된 백그라운드 프로세스로 기동
//! - Reader/Answer: 운영자 쪽 읽기와 답변 제출
//!
//! ## 문서 흐름
//!
//! ```text
//! dispatcher ──► task.json, bridge.pid
//! supervisor ──► status.json, question.json, result.json, output.log
//! operator  ──► answer.json  (supervisor가 소비 후 삭제)
//! ```

pub mod agent;
pub mod answer;
pub mod dispatch;
pub mod document;
pub mod reader;
pub mod state;
pub mod store;
pub mod supervisor;

// ============================================================================
// State
// ============================================================================
pub use state::TaskStatus;

// ============================================================================
// Documents
// ============================================================================
pub use document::{AnswerRecord, QuestionRecord, ResultRecord, StatusRecord, TaskManifest};

// ============================================================================
// Store
// ============================================================================
pub use store::{validate_task_id, TaskStore};

// ============================================================================
// Agent session
// ============================================================================
pub use agent::{AgentEvent, AgentSession, AssistantBlock, ResultEvent, QUESTION_TOOL};

// ============================================================================
// Supervisor
// ============================================================================
pub use supervisor::{Supervisor, SupervisorConfig};

// ============================================================================
// Dispatch
// ============================================================================
pub use dispatch::{generate_task_id, DispatchRequest, Dispatcher};

// ============================================================================
// Operator side (read + answer)
// ============================================================================
pub use answer::{submit_answer, SubmitOutcome};
pub use reader::{StatusReader, StatusReport, TaskSummary};
