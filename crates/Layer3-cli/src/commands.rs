//! Operator subcommands
//!
//! 모든 명령은 태스크 저장소 문서에 대한 얇은 래퍼다.
//! stdout은 명령 출력 전용이고 진단은 stderr(tracing)로 나간다.

use relay_bridge::{
    submit_answer, DispatchRequest, Dispatcher, StatusReader, Supervisor, SupervisorConfig,
    TaskStore,
};
use relay_foundation::RelayConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ============================================================================
// 태스크 실행
// ============================================================================

/// Launch a detached task and print its id
pub async fn dispatch(
    config: &RelayConfig,
    task_id: Option<String>,
    workdir: PathBuf,
    prompt: String,
) -> anyhow::Result<()> {
    let store = TaskStore::from_config(config)?;
    let dispatcher = Dispatcher::new(store, config.bridge.launch_grace())?;
    let task_id = dispatcher
        .dispatch(DispatchRequest {
            task_id,
            workdir,
            prompt,
        })
        .await?;

    // stdout은 태스크 ID 한 줄 - 스크립트가 그대로 받아 쓴다
    println!("{task_id}");
    Ok(())
}

/// Run the supervisor for one task in the foreground
///
/// `dispatch`가 백그라운드로 띄우는 진입점. 터미널이 없으므로 모든 로그를
/// 태스크의 bridge 로그 파일로 보낸다.
pub async fn run_supervisor(
    config: &RelayConfig,
    task_id: &str,
    workdir: &Path,
    prompt: &str,
) -> anyhow::Result<()> {
    let store = TaskStore::from_config(config)?;
    store.ensure_task(task_id)?;

    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(store.bridge_log_path(task_id))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(std::sync::Arc::new(log)),
        )
        .init();
    tracing::info!(task_id = %task_id, "supervisor process started");

    let supervisor = Supervisor::new(
        store,
        task_id,
        workdir,
        prompt,
        SupervisorConfig::from_config(config),
    );
    supervisor.run().await?;
    Ok(())
}

// ============================================================================
// 태스크 조회
// ============================================================================

/// Show the full status of one task
pub fn status(config: &RelayConfig, task_id: &str) -> anyhow::Result<()> {
    let reader = StatusReader::new(TaskStore::from_config(config)?);
    let report = reader.report(task_id)?;

    println!("\n📋 Task {}\n", report.task_id);
    match &report.record {
        Some(record) => {
            println!("Status:   {} {}", record.status.symbol(), record.status);
            println!("Detail:   {}", record.detail);
            println!(
                "Updated:  {}",
                record.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("PID:      {}", record.pid);
        }
        None => println!("Status:   (not recorded yet)"),
    }
    if let Some(manifest) = &report.manifest {
        println!("Workdir:  {}", manifest.workdir.display());
        println!("Prompt:   {}", truncate(&manifest.prompt, 100));
    }
    if report.liveness_mismatch {
        println!("\n⚠ The supervisor for this task is not running; its status may be stale.");
    }

    if let Some(question) = reader.pending_question(task_id)? {
        println!("\nPending question: {}", truncate(&question.question, 100));
        println!("Use 'relay question {}' to see it in full.", task_id);
    }
    println!();
    Ok(())
}

/// Print the tail of a task's transcript (or the supervisor log)
pub fn log(
    config: &RelayConfig,
    task_id: &str,
    lines: Option<usize>,
    debug_log: bool,
) -> anyhow::Result<()> {
    let reader = StatusReader::new(TaskStore::from_config(config)?);
    let lines = lines.unwrap_or(config.bridge.tail_lines);
    let tail = if debug_log {
        reader.tail_debug(task_id, lines)?
    } else {
        reader.tail_output(task_id, lines)?
    };

    if tail.is_empty() {
        println!("(no output yet)");
        return Ok(());
    }
    for line in tail {
        println!("{line}");
    }
    Ok(())
}

/// Show the question a task is waiting on
pub fn question(config: &RelayConfig, task_id: &str) -> anyhow::Result<()> {
    let reader = StatusReader::new(TaskStore::from_config(config)?);
    let question = match reader.pending_question(task_id)? {
        Some(question) => question,
        None => {
            println!("No pending question.");
            return Ok(());
        }
    };

    println!("\n{}\n", question.question);
    if !question.options.is_empty() {
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
        println!();
    }
    println!(
        "Asked at {}.",
        question.asked_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Answer with: relay answer {} \"<text>\"", task_id);
    Ok(())
}

/// Show the final result of a task
pub fn result(config: &RelayConfig, task_id: &str) -> anyhow::Result<()> {
    let reader = StatusReader::new(TaskStore::from_config(config)?);
    let record = match reader.task_result(task_id)? {
        Some(record) => record,
        None => {
            println!("No result yet.");
            return Ok(());
        }
    };

    if record.is_error {
        println!("✗ Agent reported an error\n");
    }
    match &record.result {
        Some(text) => println!("{text}"),
        None => println!("{}", serde_json::to_string_pretty(&record)?),
    }

    // 요약 푸터 - 있는 필드만 모아서 한 줄
    let mut parts = Vec::new();
    if let Some(subtype) = &record.subtype {
        parts.push(subtype.clone());
    }
    if let Some(turns) = record.num_turns {
        parts.push(format!("{turns} turns"));
    }
    if let Some(cost) = record.total_cost_usd {
        parts.push(format!("${cost:.4}"));
    }
    if !parts.is_empty() {
        println!("\n[{}]", parts.join(" | "));
    }
    Ok(())
}

// ============================================================================
// 답변 / 목록
// ============================================================================

/// Record an answer for a waiting task
pub fn answer(config: &RelayConfig, task_id: &str, text: &str) -> anyhow::Result<()> {
    let store = TaskStore::from_config(config)?;
    let outcome = submit_answer(&store, task_id, text)?;
    if let Some(warning) = outcome.warning {
        eprintln!("Warning: {warning}");
    }
    println!("Answer recorded for task {task_id}.");
    Ok(())
}

/// List all known tasks
pub fn list(config: &RelayConfig) -> anyhow::Result<()> {
    let reader = StatusReader::new(TaskStore::from_config(config)?);
    let summaries = reader.list()?;

    if summaries.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!("\n📋 Tasks\n");
    println!(
        "{:<28} {:<20} {:<20} {}",
        "ID", "STATUS", "UPDATED", "DETAIL"
    );
    println!("{}", "-".repeat(100));

    for summary in &summaries {
        let status = match summary.status {
            Some(status) => status.to_string(),
            None => "(none)".to_string(),
        };
        let updated = summary
            .updated_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {:<20} {:<20} {}",
            truncate(&summary.task_id, 26),
            status,
            updated,
            truncate(&summary.detail, 40),
        );
    }

    for summary in summaries.iter().filter(|s| s.liveness_mismatch) {
        println!(
            "\n⚠ {}: supervisor not running; status may be stale",
            summary.task_id
        );
    }

    println!("\nUse 'relay status <ID>' to inspect a task.\n");
    Ok(())
}

/// Truncate a string for display
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_len {
        s
    } else {
        let cut: String = s.chars().take(max_len).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_strings() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_flattens_newlines() {
        assert_eq!(truncate("a\nb", 10), "a b");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let cut = truncate("한국어 프롬프트입니다", 4);
        assert_eq!(cut, "한국어 ...");
    }
}
