//! Status reader - read-only views over the task store
//!
//! 읽기는 태스크 상태를 절대 바꾸지 않는다. PID 생존 검사도 보고만 할 뿐
//! status.json을 고쳐 쓰지 않는다 (single-writer 원칙).

use crate::document::{QuestionRecord, ResultRecord, StatusRecord, TaskManifest};
use crate::state::TaskStatus;
use crate::store::TaskStore;
use chrono::{DateTime, Utc};
use relay_foundation::{pid_alive, Error, Result};
use tracing::warn;

// ============================================================================
// Report types
// ============================================================================

/// 태스크 하나의 상태 보고
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub task_id: String,

    /// 아직 상태가 기록되지 않았으면 None
    pub record: Option<StatusRecord>,

    pub manifest: Option<TaskManifest>,

    /// 활성 상태인데 기록된 PID가 죽어 있음 (supervisor 크래시 신호)
    pub liveness_mismatch: bool,
}

/// `list` 출력용 요약 한 줄
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub task_id: String,

    pub status: Option<TaskStatus>,

    pub detail: String,

    pub updated_at: Option<DateTime<Utc>>,

    pub liveness_mismatch: bool,
}

// ============================================================================
// Status reader
// ============================================================================

/// 저장소를 읽기 전용으로 들여다보는 reader
pub struct StatusReader {
    store: TaskStore,
}

impl StatusReader {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }

    fn require_task(&self, task_id: &str) -> Result<()> {
        if !self.store.task_exists(task_id) {
            return Err(Error::TaskNotFound(task_id.to_string()));
        }
        Ok(())
    }

    /// 태스크 하나의 전체 상태
    pub fn report(&self, task_id: &str) -> Result<StatusReport> {
        self.require_task(task_id)?;
        let record = self.store.read_status(task_id)?;
        let manifest = self.store.read_manifest(task_id)?;
        let liveness_mismatch = record.as_ref().map(Self::mismatch).unwrap_or(false);

        Ok(StatusReport {
            task_id: task_id.to_string(),
            record,
            manifest,
            liveness_mismatch,
        })
    }

    /// 대기 중인 질문
    pub fn pending_question(&self, task_id: &str) -> Result<Option<QuestionRecord>> {
        self.require_task(task_id)?;
        self.store.read_question(task_id)
    }

    /// 최종 결과
    pub fn task_result(&self, task_id: &str) -> Result<Option<ResultRecord>> {
        self.require_task(task_id)?;
        self.store.read_result(task_id)
    }

    /// output.log 꼬리
    pub fn tail_output(&self, task_id: &str, lines: usize) -> Result<Vec<String>> {
        self.require_task(task_id)?;
        self.store.read_output_tail(task_id, lines)
    }

    /// bridge.log 꼬리 (supervisor 진단)
    pub fn tail_debug(&self, task_id: &str, lines: usize) -> Result<Vec<String>> {
        self.require_task(task_id)?;
        self.store.read_debug_tail(task_id, lines)
    }

    /// 전체 태스크 요약 (최근 갱신순)
    ///
    /// 상태가 없거나 깨진 태스크도 줄은 나온다 - 목록이 통째로 죽는 것보다
    /// "unknown" 한 줄이 낫다.
    pub fn list(&self) -> Result<Vec<TaskSummary>> {
        let mut summaries = Vec::new();
        for task_id in self.store.list_task_ids()? {
            let summary = match self.store.read_status(&task_id) {
                Ok(Some(record)) => TaskSummary {
                    task_id,
                    status: Some(record.status),
                    detail: record.detail.clone(),
                    updated_at: Some(record.updated_at),
                    liveness_mismatch: Self::mismatch(&record),
                },
                Ok(None) => TaskSummary {
                    task_id,
                    status: None,
                    detail: "no status recorded".to_string(),
                    updated_at: None,
                    liveness_mismatch: false,
                },
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "unreadable status document");
                    TaskSummary {
                        task_id,
                        status: None,
                        detail: "status unreadable".to_string(),
                        updated_at: None,
                        liveness_mismatch: false,
                    }
                }
            };
            summaries.push(summary);
        }

        // 최근에 움직인 태스크가 위로, 상태 없는 태스크는 아래로
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// 활성 상태 주장과 실제 프로세스 생존이 어긋나는가
    fn mismatch(record: &StatusRecord) -> bool {
        record.status.is_active() && !pid_alive(record.pid)
    }
}
