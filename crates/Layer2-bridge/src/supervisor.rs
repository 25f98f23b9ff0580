//! Task supervisor - drives one agent session and owns the task's documents
//!
//! Features:
//! - Single writer for status.json / question.json / result.json
//! - Question relay: intercepts the question tool, waits for an operator
//!   answer on disk, falls back to the first option on timeout
//! - Write ordering: question.json lands before waiting_for_answer,
//!   result.json lands before a terminal status
//! - Terminal states are never overwritten
//!
//! State machine:
//!
//! ```text
//! starting ──► running ──► waiting_for_answer
//!                 ▲               │
//!                 └───────────────┘
//!                 │
//!                 ▼
//!            complete | error
//! ```

use crate::agent::{self, AgentEvent, AgentSession, AssistantBlock, ResultEvent, QUESTION_TOOL};
use crate::document::{QuestionRecord, ResultRecord, StatusRecord, TaskManifest};
use crate::state::TaskStatus;
use crate::store::TaskStore;
use chrono::Utc;
use relay_foundation::{AgentConfig, Error, RelayConfig, Result};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 옵션 없는 질문이 시간 초과됐을 때의 대체 답변
const DEFAULT_FREE_ANSWER: &str = "No preference";

// ============================================================================
// Supervisor config
// ============================================================================

/// Supervisor 타이밍 + 에이전트 실행 설정
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// answer.json 폴링 간격
    pub poll_interval: Duration,

    /// 답변 대기 한도 (초과 시 기본 답변으로 진행)
    pub answer_timeout: Duration,

    /// 띄울 에이전트
    pub agent: AgentConfig,
}

impl SupervisorConfig {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            poll_interval: config.bridge.poll_interval(),
            answer_timeout: config.bridge.answer_timeout(),
            agent: config.agent.clone(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// 태스크 하나를 끝까지 책임지는 supervisor
pub struct Supervisor {
    store: TaskStore,
    task_id: String,
    workdir: PathBuf,
    prompt: String,
    config: SupervisorConfig,

    /// 터미널 상태를 기록했는가 - 이후 상태 쓰기는 전부 무시된다
    terminal: bool,
}

impl Supervisor {
    pub fn new(
        store: TaskStore,
        task_id: impl Into<String>,
        workdir: impl Into<PathBuf>,
        prompt: impl Into<String>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            store,
            task_id: task_id.into(),
            workdir: workdir.into(),
            prompt: prompt.into(),
            config,
            terminal: false,
        }
    }

    /// 태스크를 끝까지 실행한다
    ///
    /// 반환값이 곧 supervisor 프로세스의 성패다. 에이전트가 결과에서
    /// 실패를 보고한 경우는 문서에 기록될 뿐 Ok로 끝난다.
    pub async fn run(mut self) -> Result<()> {
        self.store.ensure_task(&self.task_id)?;
        self.store.write_pid(&self.task_id, std::process::id())?;
        self.store.write_manifest(
            &self.task_id,
            &TaskManifest::now(&self.task_id, &self.workdir, &self.prompt),
        )?;
        self.set_status(TaskStatus::Starting, "Initializing agent session")?;
        self.store.touch_output(&self.task_id)?;

        info!(
            task_id = %self.task_id,
            workdir = %self.workdir.display(),
            "supervisor started"
        );

        let outcome = self.supervise().await;

        if let Err(err) = &outcome {
            if !self.terminal {
                error!(error = %err, "supervisor run failed");
                let _ = self
                    .store
                    .append_output(&self.task_id, &format!("\n[BRIDGE ERROR] {err}\n"));
                self.finish(TaskStatus::Error, &err.detail())?;
            }
        }
        outcome
    }

    /// drive()를 SIGTERM 감시 아래에서 돌린다
    async fn supervise(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            enum Driven {
                Finished(Result<()>),
                Terminated,
            }

            let mut sigterm = signal(SignalKind::terminate())
                .map_err(|e| Error::Internal(format!("cannot install SIGTERM handler: {e}")))?;

            // select가 drive 퓨처를 떨어뜨리면 kill_on_drop이 에이전트를 정리한다
            let driven = tokio::select! {
                res = self.drive() => Driven::Finished(res),
                _ = sigterm.recv() => Driven::Terminated,
            };

            match driven {
                Driven::Finished(res) => res,
                Driven::Terminated => {
                    warn!("SIGTERM received, aborting agent session");
                    self.finish(TaskStatus::Error, "Process terminated by signal")?;
                    Err(Error::Cancelled)
                }
            }
        }
        #[cfg(not(unix))]
        {
            self.drive().await
        }
    }

    /// 에이전트 세션을 열고 이벤트 스트림을 소진한다
    async fn drive(&mut self) -> Result<()> {
        let mut session = AgentSession::spawn(&self.config.agent, &self.workdir).await?;
        session.send_line(&agent::user_message(&self.prompt)).await?;

        let mut established = false;
        let mut saw_result = false;

        while let Some(event) = session.next_event().await? {
            // 첫 이벤트가 곧 세션 성립의 증거다
            if !established {
                established = true;
                self.set_status(TaskStatus::Running, "Agent session active")?;
            }

            match event {
                AgentEvent::SessionInit { session_id } => {
                    if let Some(id) = session_id {
                        debug!(session_id = %id, "agent session established");
                    }
                }
                AgentEvent::Assistant { blocks } => {
                    for block in blocks {
                        match block {
                            AssistantBlock::Text(text) => {
                                self.store.append_output(&self.task_id, &format!("{text}\n"))?;
                            }
                            AssistantBlock::ToolUse(name) => {
                                self.store
                                    .append_output(&self.task_id, &format!("[Tool: {name}]\n"))?;
                            }
                        }
                    }
                }
                AgentEvent::CanUseTool {
                    request_id,
                    tool_name,
                    input,
                } => {
                    let updated_input = if tool_name == QUESTION_TOOL {
                        self.relay_question(input).await?
                    } else {
                        debug!(tool = %tool_name, "auto-allowing tool");
                        input
                    };
                    session
                        .send_line(&agent::allow_response(&request_id, updated_input))
                        .await?;
                }
                AgentEvent::Result(payload) => {
                    saw_result = true;
                    let is_error = payload.is_error;
                    // result.json이 터미널 상태보다 먼저 디스크에 닿아야 한다
                    self.store
                        .write_result(&self.task_id, &result_record(payload))?;
                    if is_error {
                        self.finish(TaskStatus::Error, "Agent reported an error")?;
                    } else {
                        self.finish(TaskStatus::Complete, "Task finished successfully")?;
                    }
                }
                AgentEvent::Other { .. } => {}
            }
        }

        let status = session.wait().await?;
        if !saw_result {
            let detail = match status.code() {
                Some(code) => format!("Agent exited without result (exit code {code})"),
                None => "Agent exited without result (killed by signal)".to_string(),
            };
            return Err(Error::Agent(detail));
        }

        info!(task_id = %self.task_id, "agent session closed");
        Ok(())
    }

    // ========================================================================
    // Question relay
    // ========================================================================

    /// 질문 도구 호출을 가로채 운영자에게 중계하고, 답을 주입한 입력을 돌려준다
    async fn relay_question(&mut self, input: Value) -> Result<Value> {
        let context = QuestionContext::from_input(&input);

        // 터미널 이후에 도착한 질문은 문서를 건드리지 않고 기본 답으로 흘려보낸다
        if self.terminal {
            return Ok(context.updated_input(context.default_answers()));
        }

        // 이전 교환의 낡은 답변이 이번 질문을 만족시키면 안 된다
        self.store.clear_answer(&self.task_id)?;

        // 질문이 waiting_for_answer보다 먼저 보여야 한다
        self.store.write_question(
            &self.task_id,
            &QuestionRecord::now(context.first_question.clone(), context.options.clone()),
        )?;
        self.set_status(
            TaskStatus::WaitingForAnswer,
            "Agent is asking a clarifying question",
        )?;
        info!(question = %context.first_question, "waiting for operator answer");

        let answers = match self.await_answer().await? {
            Some(text) => {
                self.store.clear_question(&self.task_id)?;
                self.store.clear_answer(&self.task_id)?;
                self.set_status(TaskStatus::Running, "Received answer, continuing")?;
                info!("operator answer received");
                context.answers_with(&text)
            }
            None => {
                self.store.clear_question(&self.task_id)?;
                self.set_status(TaskStatus::Running, "Answer timed out, continuing with default")?;
                warn!(
                    timeout_secs = self.config.answer_timeout.as_secs(),
                    "no answer within budget, falling back to defaults"
                );
                context.default_answers()
            }
        };

        Ok(context.updated_input(answers))
    }

    /// answer.json을 폴링한다. 한도를 넘기면 None.
    async fn await_answer(&self) -> Result<Option<String>> {
        let deadline = tokio::time::Instant::now() + self.config.answer_timeout;
        loop {
            if let Some(answer) = self.store.read_answer(&self.task_id)? {
                return Ok(Some(answer.text));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    // ========================================================================
    // Status writes
    // ========================================================================

    fn set_status(&mut self, status: TaskStatus, detail: &str) -> Result<()> {
        if self.terminal {
            debug!(status = %status, "ignoring status write after terminal state");
            return Ok(());
        }
        self.store
            .write_status(&self.task_id, &StatusRecord::now(status, detail))?;
        debug!(status = %status, detail = %detail, "status updated");
        Ok(())
    }

    fn finish(&mut self, status: TaskStatus, detail: &str) -> Result<()> {
        debug_assert!(status.is_terminal());
        self.set_status(status, detail)?;
        self.terminal = true;
        Ok(())
    }
}

fn result_record(payload: ResultEvent) -> ResultRecord {
    ResultRecord {
        subtype: payload.subtype,
        result: payload.result,
        is_error: payload.is_error,
        session_id: payload.session_id,
        num_turns: payload.num_turns,
        total_cost_usd: payload.total_cost_usd,
        completed_at: Utc::now(),
    }
}

// ============================================================================
// Question context
// ============================================================================

/// 질문 도구 입력을 중계용으로 해석한 것
///
/// 운영자에게는 첫 번째 질문만 보여준다. 입력에 질문이 더 있으면
/// 나머지는 기본 답변(첫 옵션)으로 채워서 되돌려준다.
struct QuestionContext {
    /// 원본 questions 배열 (updatedInput에 그대로 실려 나간다)
    questions: Value,

    first_question: String,

    options: Vec<String>,
}

impl QuestionContext {
    fn from_input(input: &Value) -> Self {
        let questions = input
            .get("questions")
            .cloned()
            .unwrap_or_else(|| json!([]));
        let first = questions.get(0);

        let first_question = first
            .and_then(|q| q.get("question"))
            .and_then(Value::as_str)
            .unwrap_or("The agent needs a decision to continue")
            .to_string();
        let options = first.map(option_labels).unwrap_or_default();

        Self {
            questions,
            first_question,
            options,
        }
    }

    /// 운영자 답변을 첫 질문에 매핑, 나머지 질문은 기본값
    fn answers_with(&self, text: &str) -> Map<String, Value> {
        let mut answers = self.default_answers();
        answers.insert(
            self.first_question.clone(),
            Value::String(text.to_string()),
        );
        answers
    }

    /// 모든 질문에 기본 답변 (첫 옵션 또는 "No preference")
    fn default_answers(&self) -> Map<String, Value> {
        let mut answers = Map::new();
        if let Some(list) = self.questions.as_array() {
            for q in list {
                let Some(text) = q.get("question").and_then(Value::as_str) else {
                    continue;
                };
                let labels = option_labels(q);
                let default = labels
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_FREE_ANSWER.to_string());
                answers.insert(text.to_string(), Value::String(default));
            }
        }
        answers
    }

    fn updated_input(&self, answers: Map<String, Value>) -> Value {
        json!({
            "questions": self.questions,
            "answers": Value::Object(answers),
        })
    }
}

/// 질문 하나의 옵션 레이블들. 문자열과 `{label}` 객체 둘 다 허용.
fn option_labels(question: &Value) -> Vec<String> {
    let Some(options) = question.get("options").and_then(Value::as_array) else {
        return Vec::new();
    };
    options
        .iter()
        .filter_map(|option| match option {
            Value::String(label) => Some(label.clone()),
            other => other
                .get("label")
                .and_then(Value::as_str)
                .map(String::from),
        })
        .collect()
}
