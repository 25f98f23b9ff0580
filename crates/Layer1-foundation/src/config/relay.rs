//! Relay Config - 통합 설정
//!
//! 모든 설정을 통합 관리하는 RelayConfig

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 설정 파일명
pub const RELAY_CONFIG_FILE: &str = "config.json";

/// 기본 태스크 루트 디렉토리명 (홈 기준)
const DEFAULT_BASE_DIR_NAME: &str = ".relaycode";

/// 환경변수로 태스크 루트 재지정
const BASE_DIR_ENV: &str = "RELAY_HOME";

// ============================================================================
// Relay Config (통합)
// ============================================================================

/// RelayCode 통합 설정
///
/// 글로벌(`~/.config/relaycode/config.json`)과 프로젝트(`./.relaycode/config.json`)
/// 설정을 병합해서 사용
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// 태스크 저장 루트 (기본: `~/.relaycode`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// 에이전트 실행 설정
    #[serde(default)]
    pub agent: AgentConfig,

    /// Bridge 타이밍 설정
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<RelayConfig>(RELAY_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<RelayConfig>(RELAY_CONFIG_FILE)?
            {
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// 글로벌 설정만 로드
    pub fn load_global() -> Result<Self> {
        let store = JsonStore::global()?;
        Ok(store.load_or_default(RELAY_CONFIG_FILE))
    }

    /// 글로벌 설정 저장
    pub fn save_global(&self) -> Result<()> {
        let store = JsonStore::global()?;
        store.save(RELAY_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: RelayConfig) {
        if other.base_dir.is_some() {
            self.base_dir = other.base_dir;
        }
        self.agent.merge(other.agent);
        self.bridge.merge(other.bridge);
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// 태스크 루트 결정: `RELAY_HOME` > `baseDir` > `~/.relaycode`
    pub fn resolve_base_dir(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(BASE_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        if let Some(dir) = &self.base_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("could not determine home directory".to_string()))?;
        Ok(home.join(DEFAULT_BASE_DIR_NAME))
    }
}

// ============================================================================
// Agent Config
// ============================================================================

/// 에이전트 실행 설정
///
/// 프로그램과 인자는 stream-json 세션 프로토콜을 말하는 에이전트라면
/// 무엇이든 지정 가능
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// 실행할 프로그램 (PATH 검색 또는 절대 경로)
    #[serde(default = "default_agent_program")]
    pub program: String,

    /// 프로그램 인자
    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
            args: default_agent_args(),
        }
    }
}

impl AgentConfig {
    fn merge(&mut self, other: AgentConfig) {
        if other.program != default_agent_program() {
            self.program = other.program;
        }
        if other.args != default_agent_args() {
            self.args = other.args;
        }
    }
}

// ============================================================================
// Bridge Config
// ============================================================================

/// Bridge 타이밍 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// 답변 폴링 간격 (초)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// 답변 대기 한도 (초) - 초과 시 첫 번째 옵션으로 진행
    #[serde(default = "default_answer_timeout")]
    pub answer_timeout_secs: u64,

    /// dispatch 직후 supervisor 생존 확인까지의 유예 (밀리초)
    #[serde(default = "default_launch_grace")]
    pub launch_grace_ms: u64,

    /// `log` 명령 기본 출력 줄 수
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            answer_timeout_secs: default_answer_timeout(),
            launch_grace_ms: default_launch_grace(),
            tail_lines: default_tail_lines(),
        }
    }
}

impl BridgeConfig {
    fn merge(&mut self, other: BridgeConfig) {
        if other.poll_interval_secs != default_poll_interval() {
            self.poll_interval_secs = other.poll_interval_secs;
        }
        if other.answer_timeout_secs != default_answer_timeout() {
            self.answer_timeout_secs = other.answer_timeout_secs;
        }
        if other.launch_grace_ms != default_launch_grace() {
            self.launch_grace_ms = other.launch_grace_ms;
        }
        if other.tail_lines != default_tail_lines() {
            self.tail_lines = other.tail_lines;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }

    pub fn launch_grace(&self) -> Duration {
        Duration::from_millis(self.launch_grace_ms)
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_version() -> u32 {
    1
}

fn default_agent_program() -> String {
    "claude".to_string()
}

fn default_agent_args() -> Vec<String> {
    vec![
        "-p".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--input-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--permission-mode".to_string(),
        "acceptEdits".to_string(),
    ]
}

fn default_poll_interval() -> u64 {
    2
}

fn default_answer_timeout() -> u64 {
    600
}

fn default_launch_grace() -> u64 {
    1500
}

fn default_tail_lines() -> usize {
    40
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = BridgeConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.answer_timeout(), Duration::from_secs(600));
        assert_eq!(config.launch_grace(), Duration::from_millis(1500));
        assert_eq!(config.tail_lines, 40);
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let mut base = RelayConfig::default();
        let mut project = RelayConfig::default();
        project.base_dir = Some(PathBuf::from("/srv/tasks"));
        project.agent.program = "mock-agent".to_string();
        project.bridge.answer_timeout_secs = 30;

        base.merge(project);

        assert_eq!(base.base_dir, Some(PathBuf::from("/srv/tasks")));
        assert_eq!(base.agent.program, "mock-agent");
        assert_eq!(base.bridge.answer_timeout_secs, 30);
        // 미지정 항목은 기본값 유지
        assert_eq!(base.bridge.poll_interval_secs, 2);
    }

    #[test]
    fn test_merge_keeps_defaults_when_other_is_default() {
        let mut base = RelayConfig::default();
        base.agent.program = "custom".to_string();

        base.merge(RelayConfig::default());
        assert_eq!(base.agent.program, "custom");
    }

    #[test]
    fn test_config_roundtrip_uses_camel_case() {
        let config = RelayConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"answerTimeoutSecs\""));
        assert!(json.contains("\"pollIntervalSecs\""));

        let parsed: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.agent.program, "claude");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: RelayConfig =
            serde_json::from_str(r#"{"bridge":{"pollIntervalSecs":1}}"#).unwrap();
        assert_eq!(parsed.bridge.poll_interval_secs, 1);
        assert_eq!(parsed.bridge.answer_timeout_secs, 600);
        assert_eq!(parsed.agent.program, "claude");
    }
}
