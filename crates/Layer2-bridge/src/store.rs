//! Task store - durable file layout under the relay base directory
//!
//! ## Layout
//!
//! ```text
//! <base>/tasks/<task-id>/
//!   task.json       dispatch manifest (불변)
//!   status.json     현재 상태 (supervisor가 갱신)
//!   question.json   대기 중인 질문 (waiting 동안에만)
//!   answer.json     운영자 답변 (소비되면 삭제)
//!   result.json     최종 결과 (터미널 직전 한 번)
//!   output.log      에이전트 출력 (append 전용)
//!   bridge.log      supervisor 진단 로그
//!   bridge.pid      supervisor PID (plain text)
//! ```
//!
//! 모든 JSON 문서는 stage + rename으로만 교체되므로 폴링하는 쪽은
//! 언제나 온전한 문서를 읽는다.

use crate::document::{AnswerRecord, QuestionRecord, ResultRecord, StatusRecord, TaskManifest};
use relay_foundation::{write_atomic, write_json_atomic, Error, RelayConfig, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

// ============================================================================
// 파일명
// ============================================================================

pub const MANIFEST_FILE: &str = "task.json";
pub const STATUS_FILE: &str = "status.json";
pub const QUESTION_FILE: &str = "question.json";
pub const ANSWER_FILE: &str = "answer.json";
pub const RESULT_FILE: &str = "result.json";
pub const OUTPUT_LOG_FILE: &str = "output.log";
pub const BRIDGE_LOG_FILE: &str = "bridge.log";
pub const PID_FILE: &str = "bridge.pid";

/// 태스크 디렉토리들이 모이는 하위 디렉토리명
const TASKS_DIR: &str = "tasks";

// ============================================================================
// Task Store
// ============================================================================

/// 태스크별 문서/로그 저장소
#[derive(Debug, Clone)]
pub struct TaskStore {
    base_dir: PathBuf,
}

impl TaskStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 설정에서 태스크 루트를 결정해서 생성
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(Self::new(config.resolve_base_dir()?))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.base_dir.join(TASKS_DIR)
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.tasks_dir().join(task_id)
    }

    pub fn task_exists(&self, task_id: &str) -> bool {
        self.task_dir(task_id).is_dir()
    }

    // ========================================================================
    // 태스크 디렉토리 관리
    // ========================================================================

    /// 새 태스크 디렉토리 생성 (이미 있으면 에러)
    pub fn create_task(&self, task_id: &str) -> Result<()> {
        validate_task_id(task_id)?;
        std::fs::create_dir_all(self.tasks_dir())?;
        std::fs::create_dir(self.task_dir(task_id)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::DuplicateTask(task_id.to_string())
            } else {
                Error::Io(e)
            }
        })
    }

    /// 태스크 디렉토리 보장 (있으면 그대로)
    pub fn ensure_task(&self, task_id: &str) -> Result<()> {
        validate_task_id(task_id)?;
        std::fs::create_dir_all(self.task_dir(task_id))?;
        Ok(())
    }

    /// 알려진 태스크 ID 목록 (이름순)
    pub fn list_task_ids(&self) -> Result<Vec<String>> {
        let tasks_dir = self.tasks_dir();
        if !tasks_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&tasks_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            ids.push(name.to_string());
        }
        ids.sort();
        Ok(ids)
    }

    // ========================================================================
    // 문서 읽기/쓰기
    // ========================================================================

    pub fn write_status(&self, task_id: &str, record: &StatusRecord) -> Result<()> {
        self.write_doc(task_id, STATUS_FILE, record)
    }

    pub fn read_status(&self, task_id: &str) -> Result<Option<StatusRecord>> {
        self.read_doc(task_id, STATUS_FILE)
    }

    pub fn write_question(&self, task_id: &str, record: &QuestionRecord) -> Result<()> {
        self.write_doc(task_id, QUESTION_FILE, record)
    }

    pub fn read_question(&self, task_id: &str) -> Result<Option<QuestionRecord>> {
        self.read_doc(task_id, QUESTION_FILE)
    }

    pub fn clear_question(&self, task_id: &str) -> Result<()> {
        self.remove_doc(task_id, QUESTION_FILE)
    }

    pub fn write_answer(&self, task_id: &str, record: &AnswerRecord) -> Result<()> {
        self.write_doc(task_id, ANSWER_FILE, record)
    }

    pub fn read_answer(&self, task_id: &str) -> Result<Option<AnswerRecord>> {
        self.read_doc(task_id, ANSWER_FILE)
    }

    pub fn clear_answer(&self, task_id: &str) -> Result<()> {
        self.remove_doc(task_id, ANSWER_FILE)
    }

    pub fn write_result(&self, task_id: &str, record: &ResultRecord) -> Result<()> {
        self.write_doc(task_id, RESULT_FILE, record)
    }

    pub fn read_result(&self, task_id: &str) -> Result<Option<ResultRecord>> {
        self.read_doc(task_id, RESULT_FILE)
    }

    pub fn write_manifest(&self, task_id: &str, manifest: &TaskManifest) -> Result<()> {
        self.write_doc(task_id, MANIFEST_FILE, manifest)
    }

    pub fn read_manifest(&self, task_id: &str) -> Result<Option<TaskManifest>> {
        self.read_doc(task_id, MANIFEST_FILE)
    }

    // ========================================================================
    // PID 파일
    // ========================================================================

    pub fn write_pid(&self, task_id: &str, pid: u32) -> Result<()> {
        let path = self.task_dir(task_id).join(PID_FILE);
        write_atomic(&path, format!("{pid}\n").as_bytes())
    }

    pub fn read_pid(&self, task_id: &str) -> Result<Option<u32>> {
        let path = self.task_dir(task_id).join(PID_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let pid = content
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::Storage(format!("invalid pid file: {}", path.display())))?;
        Ok(Some(pid))
    }

    // ========================================================================
    // 로그
    // ========================================================================

    /// 에이전트 출력 추가 (append 전용)
    pub fn append_output(&self, task_id: &str, text: &str) -> Result<()> {
        let path = self.task_dir(task_id).join(OUTPUT_LOG_FILE);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    /// output.log를 비어 있는 상태로라도 만들어 둔다 (tail이 바로 동작하도록)
    pub fn touch_output(&self, task_id: &str) -> Result<()> {
        let path = self.task_dir(task_id).join(OUTPUT_LOG_FILE);
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(())
    }

    /// output.log의 마지막 n줄
    pub fn read_output_tail(&self, task_id: &str, lines: usize) -> Result<Vec<String>> {
        self.read_tail(self.task_dir(task_id).join(OUTPUT_LOG_FILE), lines)
    }

    /// bridge.log의 마지막 n줄
    pub fn read_debug_tail(&self, task_id: &str, lines: usize) -> Result<Vec<String>> {
        self.read_tail(self.task_dir(task_id).join(BRIDGE_LOG_FILE), lines)
    }

    pub fn bridge_log_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join(BRIDGE_LOG_FILE)
    }

    // ========================================================================
    // 내부 헬퍼
    // ========================================================================

    fn write_doc<T: Serialize>(&self, task_id: &str, filename: &str, value: &T) -> Result<()> {
        let path = self.task_dir(task_id).join(filename);
        write_json_atomic(&path, value)
    }

    /// 문서 읽기. 없으면 None, 깨진 JSON이면 에러.
    fn read_doc<T: DeserializeOwned>(&self, task_id: &str, filename: &str) -> Result<Option<T>> {
        let path = self.task_dir(task_id).join(filename);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        let value = serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("corrupt document {}: {}", path.display(), e)))?;
        Ok(Some(value))
    }

    /// 문서 삭제. 이미 없으면 성공으로 취급.
    fn remove_doc(&self, task_id: &str, filename: &str) -> Result<()> {
        let path = self.task_dir(task_id).join(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn read_tail(&self, path: PathBuf, lines: usize) -> Result<Vec<String>> {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };
        // 마지막 줄이 아직 쓰이는 중이어도 lines()는 온전한 prefix를 돌려준다
        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|s| s.to_string()).collect())
    }
}

/// 태스크 ID 검증: 비어 있지 않고, ASCII 영숫자/`-`/`_` 만 허용
///
/// 경로 구성 요소로 쓰이므로 구분자나 상대 경로 조각이 끼어들면 안 된다.
pub fn validate_task_id(task_id: &str) -> Result<()> {
    if task_id.is_empty() {
        return Err(Error::InvalidTaskId("(empty)".to_string()));
    }
    let ok = task_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        return Err(Error::InvalidTaskId(task_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskStatus;

    fn store() -> (tempfile::TempDir, TaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_create_task_builds_directory() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();
        assert!(store.task_exists("task-1"));
        assert!(store.task_dir("task-1").is_dir());
    }

    #[test]
    fn test_create_task_rejects_duplicate() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();
        let err = store.create_task("task-1").unwrap_err();
        assert!(matches!(err, Error::DuplicateTask(_)));
    }

    #[test]
    fn test_create_task_rejects_bad_ids() {
        let (_dir, store) = store();
        assert!(matches!(
            store.create_task("../escape").unwrap_err(),
            Error::InvalidTaskId(_)
        ));
        assert!(matches!(
            store.create_task("a/b").unwrap_err(),
            Error::InvalidTaskId(_)
        ));
        assert!(matches!(
            store.create_task("").unwrap_err(),
            Error::InvalidTaskId(_)
        ));
    }

    #[test]
    fn test_status_roundtrip() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();

        assert!(store.read_status("task-1").unwrap().is_none());

        let record = StatusRecord::now(TaskStatus::Running, "Agent session active");
        store.write_status("task-1", &record).unwrap();

        let loaded = store.read_status("task-1").unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Running);
        assert_eq!(loaded.detail, "Agent session active");
        assert_eq!(loaded.pid, std::process::id());
    }

    #[test]
    fn test_status_write_leaves_no_tmp() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();
        store
            .write_status("task-1", &StatusRecord::now(TaskStatus::Starting, "init"))
            .unwrap();

        let tmp = store.task_dir("task-1").join("status.tmp");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_question_and_answer_lifecycle() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();

        let question = QuestionRecord::now(
            "Which framework?",
            vec!["A".to_string(), "B".to_string()],
        );
        store.write_question("task-1", &question).unwrap();

        let loaded = store.read_question("task-1").unwrap().unwrap();
        assert_eq!(loaded.options, vec!["A", "B"]);

        store.write_answer("task-1", &AnswerRecord::now("A")).unwrap();
        assert_eq!(store.read_answer("task-1").unwrap().unwrap().text, "A");

        store.clear_question("task-1").unwrap();
        store.clear_answer("task-1").unwrap();
        assert!(store.read_question("task-1").unwrap().is_none());
        assert!(store.read_answer("task-1").unwrap().is_none());

        // 이미 지워진 문서를 또 지워도 에러가 아니다
        store.clear_question("task-1").unwrap();
        store.clear_answer("task-1").unwrap();
    }

    #[test]
    fn test_corrupt_document_is_an_error_not_none() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();
        std::fs::write(store.task_dir("task-1").join(STATUS_FILE), "{not json").unwrap();

        assert!(matches!(
            store.read_status("task-1").unwrap_err(),
            Error::Storage(_)
        ));
    }

    #[test]
    fn test_pid_roundtrip() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();

        assert!(store.read_pid("task-1").unwrap().is_none());
        store.write_pid("task-1", 4242).unwrap();
        assert_eq!(store.read_pid("task-1").unwrap(), Some(4242));
    }

    #[test]
    fn test_output_append_and_tail() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();

        assert!(store.read_output_tail("task-1", 10).unwrap().is_empty());

        store.append_output("task-1", "line 1\n").unwrap();
        store.append_output("task-1", "line 2\nline 3\n").unwrap();

        let tail = store.read_output_tail("task-1", 2).unwrap();
        assert_eq!(tail, vec!["line 2", "line 3"]);

        let all = store.read_output_tail("task-1", 100).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_tail_tolerates_unterminated_last_line() {
        let (_dir, store) = store();
        store.create_task("task-1").unwrap();
        store.append_output("task-1", "done\npartial").unwrap();

        let tail = store.read_output_tail("task-1", 5).unwrap();
        assert_eq!(tail, vec!["done", "partial"]);
    }

    #[test]
    fn test_list_skips_stray_files_and_hidden_dirs() {
        let (_dir, store) = store();
        store.create_task("task-b").unwrap();
        store.create_task("task-a").unwrap();
        std::fs::write(store.tasks_dir().join("stray.txt"), "x").unwrap();
        std::fs::create_dir(store.tasks_dir().join(".hidden")).unwrap();

        let ids = store.list_task_ids().unwrap();
        assert_eq!(ids, vec!["task-a", "task-b"]);
    }

    #[test]
    fn test_list_with_missing_base_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::new(dir.path().join("never-created"));
        assert!(store.list_task_ids().unwrap().is_empty());
    }
}
