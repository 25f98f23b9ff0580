//! 원자적 파일 쓰기
//!
//! 문서를 같은 디렉토리의 `.tmp` 파일에 먼저 쓰고 rename으로 교체한다.
//! 폴링 중인 reader는 항상 이전 내용 전체 또는 새 내용 전체만 보게 된다.

use crate::Result;
use serde::Serialize;
use std::path::Path;

/// 바이트를 원자적으로 기록
///
/// rename은 같은 파일시스템 안에서 원자적이므로 tmp 파일을 대상과
/// 같은 디렉토리에 만든다.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// 값을 pretty JSON으로 직렬화해서 원자적으로 기록
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    write_atomic(path, content.as_bytes())
}
