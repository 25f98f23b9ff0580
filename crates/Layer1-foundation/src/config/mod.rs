//! Config - 통합 설정 관리
//!
//! - `relay.rs` - RelayConfig 통합 설정 (agent 명령 + bridge 타이밍)

mod relay;

pub use relay::{AgentConfig, BridgeConfig, RelayConfig, RELAY_CONFIG_FILE};
