//! On-disk task documents
//!
//! 태스크 디렉토리에 저장되는 JSON 문서들.
//! 필드명이 곧 wire 포맷이므로 serde rename 없이 snake_case 그대로 쓴다.

use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// status.json
// ============================================================================

/// 태스크의 현재 상태 (유일하게 계속 갱신되는 문서)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: TaskStatus,

    /// 사람이 읽는 한 줄 설명
    pub detail: String,

    pub updated_at: DateTime<Utc>,

    /// 이 상태를 기록한 supervisor 프로세스의 PID
    pub pid: u32,
}

impl StatusRecord {
    /// 현재 시각과 현재 프로세스 PID로 기록 생성
    pub fn now(status: TaskStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            updated_at: Utc::now(),
            pid: std::process::id(),
        }
    }
}

// ============================================================================
// question.json
// ============================================================================

/// 대기 중인 질문 (waiting_for_answer 동안에만 존재)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,

    /// 제안된 선택지 레이블 (자유 응답 질문이면 비어 있음)
    #[serde(default)]
    pub options: Vec<String>,

    pub asked_at: DateTime<Utc>,
}

impl QuestionRecord {
    pub fn now(question: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            question: question.into(),
            options,
            asked_at: Utc::now(),
        }
    }
}

// ============================================================================
// answer.json
// ============================================================================

/// 운영자가 제출한 답변
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub text: String,

    pub answered_at: DateTime<Utc>,
}

impl AnswerRecord {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            answered_at: Utc::now(),
        }
    }
}

// ============================================================================
// result.json
// ============================================================================

/// 최종 결과 (터미널 상태 직전에 한 번 기록)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    /// 에이전트가 보고한 결과 분류 (예: "success")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    /// 에이전트의 최종 응답 텍스트
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default)]
    pub is_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,

    pub completed_at: DateTime<Utc>,
}

// ============================================================================
// task.json
// ============================================================================

/// dispatch 시점에 한 번 기록되는 태스크 명세 (불변)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskManifest {
    pub task_id: String,

    pub workdir: PathBuf,

    pub prompt: String,

    pub created_at: DateTime<Utc>,
}

impl TaskManifest {
    pub fn now(
        task_id: impl Into<String>,
        workdir: impl Into<PathBuf>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            workdir: workdir.into(),
            prompt: prompt.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_record_wire_fields() {
        let record = StatusRecord::now(TaskStatus::WaitingForAnswer, "Agent is asking");
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("\"status\":\"waiting_for_answer\""));
        assert!(json.contains("\"detail\":\"Agent is asking\""));
        assert!(json.contains("\"updated_at\""));
        assert!(json.contains("\"pid\""));
        assert_eq!(record.pid, std::process::id());
    }

    #[test]
    fn test_result_record_omits_absent_fields() {
        let record = ResultRecord {
            subtype: None,
            result: Some("done".to_string()),
            is_error: false,
            session_id: None,
            num_turns: None,
            total_cost_usd: None,
            completed_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains("\"result\":\"done\""));
        assert!(!json.contains("subtype"));
        assert!(!json.contains("session_id"));
        assert!(!json.contains("total_cost_usd"));
    }

    #[test]
    fn test_question_without_options_parses() {
        let parsed: QuestionRecord = serde_json::from_str(
            r#"{"question":"Proceed?","asked_at":"2026-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed.question, "Proceed?");
        assert!(parsed.options.is_empty());
    }

    #[test]
    fn test_manifest_roundtrip() {
        let manifest = TaskManifest::now("task-1", "/tmp/project", "add tests");
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: TaskManifest = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.task_id, "task-1");
        assert_eq!(parsed.workdir, PathBuf::from("/tmp/project"));
        assert_eq!(parsed.prompt, "add tests");
    }
}
