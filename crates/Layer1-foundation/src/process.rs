//! 프로세스 생존 확인
//!
//! status.json에 기록된 supervisor PID가 실제로 살아 있는지 검사한다.
//! reader 쪽의 자문용 (advisory) 검사일 뿐, 상태를 바꾸지는 않는다.

/// PID가 살아 있는 프로세스를 가리키는지 확인
///
/// signal 0은 시그널을 보내지 않고 존재 여부만 검사한다.
/// EPERM은 우리 권한 밖의 살아 있는 프로세스를 뜻하므로 true.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// 저렴한 probe가 없는 플랫폼에서는 항상 살아 있다고 본다
#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_pid_is_alive() {
        assert!(pid_alive(std::process::id()));
    }

    #[test]
    fn test_pid_zero_is_not_alive() {
        assert!(!pid_alive(0));
    }

    #[test]
    #[cfg(unix)]
    fn test_reaped_child_is_not_alive() {
        let mut child = std::process::Command::new("true")
            .spawn()
            .expect("spawn true");
        let pid = child.id();
        child.wait().expect("wait");
        assert!(!pid_alive(pid));
    }

    #[test]
    #[cfg(unix)]
    fn test_running_child_is_alive() {
        let mut child = std::process::Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("spawn sleep");
        assert!(pid_alive(child.id()));
        child.kill().expect("kill");
        child.wait().expect("wait");
    }
}
