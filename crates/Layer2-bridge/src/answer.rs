//! Answer submission - the operator side of the question exchange
//!
//! answer.json은 운영자 쪽이 쓰는 유일한 문서다. supervisor는 읽고
//! 지우기만 한다.

use crate::document::AnswerRecord;
use crate::state::TaskStatus;
use crate::store::TaskStore;
use relay_foundation::{Error, Result};
use tracing::{info, warn};

/// 답변 제출 결과
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// 태스크가 답변을 기다리는 상태가 아니었을 때의 경고.
    /// 제출 자체는 성공이며, supervisor가 무시할 수 있다는 뜻이다.
    pub warning: Option<String>,
}

/// 답변을 기록한다
///
/// 상태 검사는 조언일 뿐 거부 사유가 아니다. 기록과 소비 사이에는
/// 원래 경쟁이 있고, 늦은 답변은 supervisor 쪽에서 알아서 무시된다.
pub fn submit_answer(store: &TaskStore, task_id: &str, text: &str) -> Result<SubmitOutcome> {
    if !store.task_exists(task_id) {
        return Err(Error::TaskNotFound(task_id.to_string()));
    }
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("answer text is empty".to_string()));
    }

    let warning = match store.read_status(task_id) {
        Ok(Some(record)) if record.status == TaskStatus::WaitingForAnswer => None,
        Ok(Some(record)) => Some(format!(
            "task status is '{}', not waiting_for_answer; the supervisor may ignore this answer",
            record.status
        )),
        Ok(None) => Some("task has no status yet; the supervisor may ignore this answer".to_string()),
        Err(e) => Some(format!("task status unreadable ({e}); submitting anyway")),
    };
    if let Some(message) = &warning {
        warn!(task_id = %task_id, "{message}");
    }

    store.write_answer(task_id, &AnswerRecord::now(text))?;
    info!(task_id = %task_id, "answer submitted");

    Ok(SubmitOutcome { warning })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StatusRecord;

    fn setup() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path());
        store.create_task("task-1").unwrap();
        (dir, store)
    }

    #[test]
    fn test_submit_to_waiting_task_has_no_warning() {
        let (_dir, store) = setup();
        store
            .write_status(
                "task-1",
                &StatusRecord::now(TaskStatus::WaitingForAnswer, "waiting"),
            )
            .unwrap();

        let outcome = submit_answer(&store, "task-1", "A").unwrap();
        assert!(outcome.warning.is_none());
        assert_eq!(store.read_answer("task-1").unwrap().unwrap().text, "A");
    }

    #[test]
    fn test_submit_to_running_task_warns_but_writes() {
        let (_dir, store) = setup();
        store
            .write_status("task-1", &StatusRecord::now(TaskStatus::Running, "active"))
            .unwrap();

        let outcome = submit_answer(&store, "task-1", "B").unwrap();
        let warning = outcome.warning.unwrap();
        assert!(warning.contains("'running'"));
        assert_eq!(store.read_answer("task-1").unwrap().unwrap().text, "B");
    }

    #[test]
    fn test_submit_without_status_warns_but_writes() {
        let (_dir, store) = setup();
        let outcome = submit_answer(&store, "task-1", "C").unwrap();
        assert!(outcome.warning.is_some());
        assert!(store.read_answer("task-1").unwrap().is_some());
    }

    #[test]
    fn test_submit_to_unknown_task_fails() {
        let (_dir, store) = setup();
        assert!(matches!(
            submit_answer(&store, "task-404", "A").unwrap_err(),
            Error::TaskNotFound(_)
        ));
    }

    #[test]
    fn test_empty_answer_is_rejected() {
        let (_dir, store) = setup();
        assert!(matches!(
            submit_answer(&store, "task-1", "   ").unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[test]
    fn test_second_submission_overwrites() {
        let (_dir, store) = setup();
        store
            .write_status(
                "task-1",
                &StatusRecord::now(TaskStatus::WaitingForAnswer, "waiting"),
            )
            .unwrap();

        submit_answer(&store, "task-1", "first").unwrap();
        submit_answer(&store, "task-1", "second").unwrap();
        // 마지막 쓰기가 이긴다
        assert_eq!(
            store.read_answer("task-1").unwrap().unwrap().text,
            "second"
        );
    }
}
