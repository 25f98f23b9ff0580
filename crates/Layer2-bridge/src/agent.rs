//! Agent session - subprocess speaking the stream-json session protocol
//!
//! Features:
//! - Newline-delimited JSON over stdin/stdout
//! - Outbound: user prompt, control responses (permission decisions)
//! - Inbound: system init, assistant messages, control requests, final result
//! - Unknown event types are logged and skipped, never fatal
//!
//! stderr is drained into the tracing stream so agent diagnostics end up
//! in the task's bridge.log.

use relay_foundation::{AgentConfig, Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// 질문 도구 이름 - 이 도구 호출만 가로채서 운영자에게 중계한다
pub const QUESTION_TOOL: &str = "AskUserQuestion";

// ============================================================================
// Inbound events
// ============================================================================

/// Content block inside an assistant message
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantBlock {
    /// Plain assistant text
    Text(String),
    /// Tool invocation (name only - the payload is not relayed)
    ToolUse(String),
}

/// One parsed line of agent stdout
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// `system`/`init` - session established
    SessionInit { session_id: Option<String> },

    /// `assistant` - message content blocks
    Assistant { blocks: Vec<AssistantBlock> },

    /// `control_request`/`can_use_tool` - permission callback before a tool runs
    CanUseTool {
        request_id: Value,
        tool_name: String,
        input: Value,
    },

    /// `result` - terminal payload, at most one per session
    Result(ResultEvent),

    /// Anything we do not understand (skipped by the session reader)
    Other { event_type: String },
}

/// Payload of the terminal `result` event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultEvent {
    #[serde(default)]
    pub subtype: Option<String>,

    #[serde(default)]
    pub result: Option<String>,

    #[serde(default)]
    pub is_error: bool,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub num_turns: Option<u32>,

    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

/// stdout 한 줄을 이벤트로 파싱
///
/// JSON이 아니거나 `type` 필드가 없으면 None (이벤트 스트림에 섞인 잡음).
pub fn parse_event(line: &str) -> Option<AgentEvent> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    let event_type = value.get("type")?.as_str()?.to_string();

    let event = match event_type.as_str() {
        "system" => {
            if value.get("subtype").and_then(Value::as_str) == Some("init") {
                AgentEvent::SessionInit {
                    session_id: value
                        .get("session_id")
                        .and_then(Value::as_str)
                        .map(String::from),
                }
            } else {
                AgentEvent::Other { event_type }
            }
        }
        "assistant" => AgentEvent::Assistant {
            blocks: parse_assistant_blocks(&value),
        },
        "control_request" => {
            let request = value.get("request");
            let subtype = request
                .and_then(|r| r.get("subtype"))
                .and_then(Value::as_str);
            if subtype != Some("can_use_tool") {
                return Some(AgentEvent::Other { event_type });
            }
            let tool_name = request
                .and_then(|r| r.get("tool_name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let input = request
                .and_then(|r| r.get("input"))
                .cloned()
                .unwrap_or_else(|| json!({}));
            AgentEvent::CanUseTool {
                request_id: value.get("request_id").cloned().unwrap_or(Value::Null),
                tool_name,
                input,
            }
        }
        "result" => match serde_json::from_value::<ResultEvent>(value) {
            Ok(payload) => AgentEvent::Result(payload),
            Err(e) => {
                warn!("malformed result event: {e}");
                AgentEvent::Other { event_type }
            }
        },
        _ => AgentEvent::Other { event_type },
    };
    Some(event)
}

fn parse_assistant_blocks(value: &Value) -> Vec<AssistantBlock> {
    let Some(content) = value
        .pointer("/message/content")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    content
        .iter()
        .filter_map(|block| match block.get("type").and_then(Value::as_str) {
            Some("text") => block
                .get("text")
                .and_then(Value::as_str)
                .map(|text| AssistantBlock::Text(text.to_string())),
            Some("tool_use") => block
                .get("name")
                .and_then(Value::as_str)
                .map(|name| AssistantBlock::ToolUse(name.to_string())),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Outbound messages
// ============================================================================

/// 세션을 시작하는 사용자 프롬프트 한 줄
pub fn user_message(prompt: &str) -> String {
    json!({
        "type": "user",
        "message": { "role": "user", "content": prompt }
    })
    .to_string()
}

/// 도구 사용을 허용하는 control response 한 줄
///
/// `updated_input`으로 도구 입력을 바꿔치기할 수 있다 - 질문 중계가
/// 답변을 주입하는 통로가 바로 이것이다.
pub fn allow_response(request_id: &Value, updated_input: Value) -> String {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": { "behavior": "allow", "updatedInput": updated_input }
        }
    })
    .to_string()
}

// ============================================================================
// Agent session
// ============================================================================

/// 실행 중인 에이전트 프로세스와의 양방향 세션
pub struct AgentSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl AgentSession {
    /// 에이전트 프로세스를 띄우고 파이프를 연결한다
    pub async fn spawn(config: &AgentConfig, workdir: &Path) -> Result<Self> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Agent(format!("agent binary not found: {}", config.program))
            } else {
                Error::Agent(format!("failed to spawn {}: {}", config.program, e))
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Agent("agent stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("agent stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Agent("agent stderr not captured".to_string()))?;

        // stderr를 진단 로그로 흘려보낸다
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!(target: "agent_stderr", "{line}");
            }
        });

        debug!(program = %config.program, "agent process spawned");

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    /// JSON 한 줄 전송 (개행 추가 + flush)
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// 다음 이벤트를 읽는다
    ///
    /// 알 수 없는 이벤트와 JSON이 아닌 줄은 건너뛴다.
    /// None은 stdout이 닫혔다는 뜻 (프로세스 종료 수순).
    pub async fn next_event(&mut self) -> Result<Option<AgentEvent>> {
        while let Some(line) = self.stdout.next_line().await? {
            match parse_event(&line) {
                Some(AgentEvent::Other { event_type }) => {
                    debug!(event_type = %event_type, "ignoring agent event");
                }
                Some(event) => return Ok(Some(event)),
                None => {
                    if !line.trim().is_empty() {
                        debug!("skipping non-event agent output");
                    }
                }
            }
        }
        Ok(None)
    }

    /// stdin을 닫고 프로세스 종료를 기다린다
    pub async fn wait(mut self) -> Result<ExitStatus> {
        drop(self.stdin);
        let status = self.child.wait().await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_init() {
        let line = r#"{"type":"system","subtype":"init","session_id":"sess-42"}"#;
        match parse_event(line) {
            Some(AgentEvent::SessionInit { session_id }) => {
                assert_eq!(session_id.as_deref(), Some("sess-42"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_assistant_blocks() {
        let line = r#"{"type":"assistant","message":{"content":[
            {"type":"text","text":"working on it"},
            {"type":"tool_use","name":"Bash","input":{"command":"ls"}},
            {"type":"thinking","thinking":"hmm"}
        ]}}"#;
        match parse_event(line) {
            Some(AgentEvent::Assistant { blocks }) => {
                assert_eq!(
                    blocks,
                    vec![
                        AssistantBlock::Text("working on it".to_string()),
                        AssistantBlock::ToolUse("Bash".to_string()),
                    ]
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_can_use_tool() {
        let line = r#"{"type":"control_request","request_id":"req-7","request":{
            "subtype":"can_use_tool",
            "tool_name":"AskUserQuestion",
            "input":{"questions":[{"question":"Which?","options":[{"label":"A"}]}]}
        }}"#;
        match parse_event(line) {
            Some(AgentEvent::CanUseTool {
                request_id,
                tool_name,
                input,
            }) => {
                assert_eq!(request_id, json!("req-7"));
                assert_eq!(tool_name, QUESTION_TOOL);
                assert_eq!(input["questions"][0]["question"], "Which?");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_result() {
        let line = r#"{"type":"result","subtype":"success","result":"all done",
            "is_error":false,"num_turns":12,"total_cost_usd":0.37,"session_id":"sess-1"}"#;
        match parse_event(line) {
            Some(AgentEvent::Result(payload)) => {
                assert_eq!(payload.subtype.as_deref(), Some("success"));
                assert_eq!(payload.result.as_deref(), Some("all done"));
                assert!(!payload.is_error);
                assert_eq!(payload.num_turns, Some(12));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_result_with_minimal_fields() {
        let line = r#"{"type":"result"}"#;
        match parse_event(line) {
            Some(AgentEvent::Result(payload)) => {
                assert!(payload.result.is_none());
                assert!(!payload.is_error);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let line = r#"{"type":"stream_delta","delta":"..."}"#;
        match parse_event(line) {
            Some(AgentEvent::Other { event_type }) => assert_eq!(event_type, "stream_delta"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_non_json_line_is_none() {
        assert!(parse_event("not json at all").is_none());
        assert!(parse_event("").is_none());
        assert!(parse_event(r#"{"no_type":true}"#).is_none());
    }

    #[test]
    fn test_user_message_shape() {
        let line = user_message("fix the tests");
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "user");
        assert_eq!(value["message"]["role"], "user");
        assert_eq!(value["message"]["content"], "fix the tests");
        // 한 줄이어야 한다 (개행은 전송부가 붙인다)
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_allow_response_shape() {
        let updated = json!({"questions": [], "answers": {"Which?": "A"}});
        let line = allow_response(&json!("req-1"), updated);
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["type"], "control_response");
        assert_eq!(value["response"]["subtype"], "success");
        assert_eq!(value["response"]["request_id"], "req-1");
        assert_eq!(value["response"]["response"]["behavior"], "allow");
        assert_eq!(
            value["response"]["response"]["updatedInput"]["answers"]["Which?"],
            "A"
        );
    }
}
