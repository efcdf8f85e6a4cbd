//! Process liveness and host identity for lock-marker holders.
//!
//! Markers live on a share that several machines can see, so a pid alone
//! says nothing about a marker written elsewhere. Liveness is only ever
//! answered for holders on this host.

/// Name of this host, or `"localhost"` if it cannot be determined.
pub fn local_hostname() -> String {
    #[cfg(unix)]
    {
        nix::unistd::gethostname()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
    }
}

/// Check if a process with the given PID is alive.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // kill(pid, 0) checks existence without sending a signal. EPERM means
    // the process exists but belongs to someone else.
    let Ok(raw_pid) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw_pid), None) {
        Ok(()) | Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Check if a process with the given PID is alive, via `tasklist`.
#[cfg(windows)]
pub fn is_process_alive(pid: u32) -> bool {
    use std::process::Command;

    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .map(|o| {
            let stdout = String::from_utf8_lossy(&o.stdout);
            !stdout.contains("No tasks") && stdout.contains(&pid.to_string())
        })
        .unwrap_or(false)
}

/// Liveness is unknown on this platform; every holder counts as alive.
#[cfg(not(any(unix, windows)))]
pub fn is_process_alive(_pid: u32) -> bool {
    // Unknown platform: never report a holder as dead
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_reaped_child_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_process_alive(pid));
    }

    #[test]
    fn test_hostname_not_empty() {
        assert!(!local_hostname().is_empty());
    }
}
