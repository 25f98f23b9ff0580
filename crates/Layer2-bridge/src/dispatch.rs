//! Dispatcher - allocates a task and launches its supervisor
//!
//! supervisor는 자기 자신(relay 바이너리)의 `run` 서브커맨드를 새 프로세스
//! 그룹으로 띄운 것이다. dispatch를 실행한 셸이 닫혀도 살아남는다.
//!
//! Features:
//! - Validation first: 요청이 틀리면 아무것도 만들지 않는다
//! - stderr를 태스크의 bridge.log로 돌려 초기 크래시도 진단 가능
//! - 짧은 유예 후 생존 확인 - 바로 죽는 supervisor는 dispatch 실패

use crate::store::TaskStore;
use chrono::Utc;
use relay_foundation::{Error, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

/// 태스크 실행 요청
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// 지정하지 않으면 타임스탬프 기반으로 생성
    pub task_id: Option<String>,

    /// 에이전트가 작업할 디렉토리 (존재해야 함)
    pub workdir: PathBuf,

    /// 에이전트에게 전달할 프롬프트
    pub prompt: String,
}

/// supervisor 프로세스를 백그라운드로 띄우는 dispatcher
pub struct Dispatcher {
    store: TaskStore,
    launch_grace: Duration,
    supervisor_program: PathBuf,
    supervisor_args: Vec<String>,
}

impl Dispatcher {
    /// 현재 실행 파일의 `run` 서브커맨드를 supervisor로 쓰는 dispatcher
    pub fn new(store: TaskStore, launch_grace: Duration) -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| {
            Error::LaunchFailed(format!("cannot resolve current executable: {e}"))
        })?;
        Ok(Self {
            store,
            launch_grace,
            supervisor_program: program,
            supervisor_args: vec!["run".to_string()],
        })
    }

    /// supervisor로 띄울 명령을 바꾼다 (테스트용 대역)
    pub fn with_supervisor_command(
        mut self,
        program: impl Into<PathBuf>,
        args: Vec<String>,
    ) -> Self {
        self.supervisor_program = program.into();
        self.supervisor_args = args;
        self
    }

    /// 태스크를 만들고 supervisor를 기동한다. 부여된 태스크 ID를 돌려준다.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<String> {
        // 검증이 전부 끝나기 전에는 디스크에 아무것도 생기지 않는다
        if !request.workdir.is_dir() {
            return Err(Error::WorkdirMissing(
                request.workdir.display().to_string(),
            ));
        }
        let workdir = request.workdir.canonicalize()?;

        let task_id = match request.task_id {
            Some(id) => id,
            None => generate_task_id(),
        };
        self.store.create_task(&task_id)?;

        info!(task_id = %task_id, workdir = %workdir.display(), "dispatching task");

        // supervisor가 뭔가 쓰기 전에 죽어도 stderr는 여기 남는다
        let log_path = self.store.bridge_log_path(&task_id);
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        // `--flag=value` 형태로 붙여 보낸다. 프롬프트는 불투명 텍스트라
        // `-`로 시작할 수 있고, 분리형 인자로 주면 clap이 플래그로 오해한다.
        let mut workdir_arg = std::ffi::OsString::from("--workdir=");
        workdir_arg.push(&workdir);

        let mut cmd = std::process::Command::new(&self.supervisor_program);
        cmd.args(&self.supervisor_args)
            .arg(format!("--task-id={task_id}"))
            .arg(workdir_arg)
            .arg(format!("--prompt={}", request.prompt))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log));

        // 새 프로세스 그룹: 부모 셸의 SIGINT/SIGHUP에 같이 죽지 않는다
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::LaunchFailed(format!("failed to start supervisor: {e}")))?;
        let pid = child.id();
        self.store.write_pid(&task_id, pid)?;
        debug!(task_id = %task_id, pid, "supervisor spawned, probing startup");

        // 기동 유예: 유예가 끝난 시점에도 살아 있어야 dispatch 성공이다
        tokio::time::sleep(self.launch_grace).await;
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                return Err(Error::LaunchFailed(format!(
                    "supervisor exited during startup ({status}); see {}",
                    log_path.display()
                )));
            }
            Err(e) => {
                return Err(Error::LaunchFailed(format!(
                    "cannot probe supervisor: {e}"
                )));
            }
        }

        info!(task_id = %task_id, pid, "supervisor started");
        Ok(task_id)
    }
}

/// 타임스탬프 + 랜덤 접미사로 태스크 ID 생성
///
/// 같은 초에 여러 번 dispatch해도 접미사가 충돌을 막는다.
pub fn generate_task_id() -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix: u16 = rand::random();
    format!("task-{stamp}-{suffix:04x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::validate_task_id;

    #[test]
    fn test_generated_ids_are_valid_and_distinct() {
        let a = generate_task_id();
        let b = generate_task_id();

        assert!(a.starts_with("task-"));
        validate_task_id(&a).unwrap();
        validate_task_id(&b).unwrap();
        // 랜덤 접미사 덕에 같은 초에 만들어도 거의 항상 다르다
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_task_id();
        // task-YYYYMMDD-HHMMSS-xxxx
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "task");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 4);
    }
}
