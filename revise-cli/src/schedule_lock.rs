use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Exclusive hold on a schedule file, released (lock file removed) on drop.
#[derive(Debug)]
pub struct ScheduleLock {
    path: PathBuf,
}

impl Drop for ScheduleLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `schedule.json` -> `schedule.json.lock`, next to the schedule.
pub fn lock_path(schedule: &Path) -> PathBuf {
    let mut name = schedule
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "schedule".into());
    name.push(".lock");
    schedule.with_file_name(name)
}

/// Wait until no other `revise` process holds `schedule`, then take it.
pub async fn acquire(schedule: &Path) -> anyhow::Result<ScheduleLock> {
    let path = lock_path(schedule);
    let started = Instant::now();

    loop {
        match try_acquire(&path) {
            Ok(lock) => return Ok(lock),
            Err(LockState::Stale) => {
                tracing::debug!(lock = %path.display(), "removing stale schedule lock");
                let _ = std::fs::remove_file(&path);
            }
            Err(state) => {
                if started.elapsed() >= LOCK_WAIT_TIMEOUT {
                    match state {
                        LockState::HeldBy(pid) => anyhow::bail!(
                            "{} is being updated by another revise process (pid {pid})",
                            schedule.display()
                        ),
                        _ => anyhow::bail!(
                            "could not lock {}; remove {} if no revise process is running",
                            schedule.display(),
                            path.display()
                        ),
                    }
                }
                tokio::time::sleep(LOCK_RETRY_DELAY).await;
            }
        }
    }
}

#[derive(Debug)]
enum LockState {
    HeldBy(i32),
    Stale,
    Unknown,
}

fn try_acquire(path: &Path) -> Result<ScheduleLock, LockState> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let _ = std::fs::create_dir_all(parent);
    }

    match OpenOptions::new().create_new(true).write(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            Ok(ScheduleLock {
                path: path.to_path_buf(),
            })
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            let mut pid_buf = String::new();
            if OpenOptions::new()
                .read(true)
                .open(path)
                .and_then(|mut file| file.read_to_string(&mut pid_buf))
                .is_err()
            {
                return Err(LockState::Unknown);
            }
            // An empty file is a holder that has not written its pid yet.
            match pid_buf.trim().parse::<i32>().ok() {
                Some(pid) if is_held_by_live_process(pid) => Err(LockState::HeldBy(pid)),
                Some(_) => Err(LockState::Stale),
                None => Err(LockState::Unknown),
            }
        }
        Err(_) => Err(LockState::Unknown),
    }
}

fn is_held_by_live_process(pid: i32) -> bool {
    // Another task of this process; `kill -0` is not needed to know it is alive.
    i64::from(pid) == i64::from(std::process::id()) || is_process_running(pid)
}

fn is_process_running(pid: i32) -> bool {
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let temp = tempfile::tempdir().unwrap();
        let schedule = temp.path().join("schedule.json");
        let path = lock_path(&schedule);
        assert_eq!(path, temp.path().join("schedule.json.lock"));

        let lock = try_acquire(&path).unwrap();
        assert!(path.is_file());
        assert!(try_acquire(&path).is_err());

        drop(lock);
        assert!(!path.exists());
        assert!(try_acquire(&path).is_ok());
    }

    #[tokio::test]
    async fn test_lock_left_by_dead_process_is_reclaimed() {
        let temp = tempfile::tempdir().unwrap();
        let schedule = temp.path().join("schedule.json");
        std::fs::write(lock_path(&schedule), "2147483000\n").unwrap();

        let lock = acquire(&schedule).await.unwrap();
        let holder = std::fs::read_to_string(lock_path(&schedule)).unwrap();
        assert_eq!(holder.trim(), std::process::id().to_string());
        drop(lock);
    }
}
