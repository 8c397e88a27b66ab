//! Periodic liveness scan.
//!
//! The monitor runs on the main event loop (never on its own thread). Each scan polls every
//! registered process, clears the running marker of any script whose process is gone, and
//! escalates overdue stop requests.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};

use crate::registry::{ProcessRegistry, Transition};
use crate::script::ScriptList;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(6);

/// A lifecycle change observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub path: String,
    pub transition: Transition,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessMonitor {
    interval: Duration,
}

impl ProcessMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(100)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A ticker whose first tick fires one full interval from now.
    pub fn ticker(&self) -> Interval {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Polls every registered process and syncs the list markers.
    pub async fn scan(
        &self,
        registry: &mut ProcessRegistry,
        scripts: &mut ScriptList,
    ) -> Vec<MonitorReport> {
        let mut transitions = registry.poll_all();
        transitions.extend(registry.enforce_stop_deadlines().await);

        // Exited entries are re-cleared every scan; markers set by hand converge.
        for path in registry.exited_paths() {
            scripts.set_running(&path, false);
        }
        registry.sweep(Some(&scripts.paths()));

        transitions
            .into_iter()
            .map(|(path, transition)| MonitorReport { path, transition })
            .collect()
    }
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registry::tests::{sh_registry, write_script};
    use crate::registry::{RestartPolicy, StopOutcome};
    use crate::store::FileListStore;

    fn list_with(dir: &tempfile::TempDir, paths: &[&str]) -> ScriptList {
        let store = FileListStore::new(dir.path().join("file.txt"));
        let mut list = ScriptList::load(store).unwrap();
        for path in paths {
            list.add(*path).unwrap();
        }
        list
    }

    async fn scan_until_report(
        monitor: &ProcessMonitor,
        registry: &mut ProcessRegistry,
        scripts: &mut ScriptList,
    ) -> Vec<MonitorReport> {
        for _ in 0..100 {
            let reports = monitor.scan(registry, scripts).await;
            if !reports.is_empty() {
                return reports;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("no report");
    }

    #[tokio::test]
    async fn scan_clears_marker_of_fast_exiting_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(&dir, "fast.sh", "exit 2\n");
        let mut scripts = list_with(&dir, &[&script]);
        let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_secs(1));
        let monitor = ProcessMonitor::default();

        scripts.set_running(&script, true);
        registry.start(&script).await.unwrap();
        let reports = scan_until_report(&monitor, &mut registry, &mut scripts).await;

        assert_eq!(
            reports,
            vec![MonitorReport {
                path: script.clone(),
                transition: Transition::Exited(Some(2)),
            }]
        );
        assert!(!scripts.get(0).unwrap().running);
        assert!(registry.contains(&script));
    }

    #[tokio::test]
    async fn rescan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(&dir, "fast.sh", "exit 0\n");
        let mut scripts = list_with(&dir, &[&script]);
        let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_secs(1));
        let monitor = ProcessMonitor::default();

        registry.start(&script).await.unwrap();
        scan_until_report(&monitor, &mut registry, &mut scripts).await;

        scripts.set_running(&script, true);
        assert!(monitor.scan(&mut registry, &mut scripts).await.is_empty());
        assert!(!scripts.get(0).unwrap().running);
    }

    #[tokio::test]
    async fn running_script_keeps_marker() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(&dir, "slow.sh", "sleep 30\n");
        let mut scripts = list_with(&dir, &[&script]);
        let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_secs(5));
        let monitor = ProcessMonitor::default();

        scripts.set_running(&script, true);
        registry.start(&script).await.unwrap();
        assert!(monitor.scan(&mut registry, &mut scripts).await.is_empty());
        assert!(scripts.get(0).unwrap().running);

        registry.stop(&script).unwrap();
        let reports = scan_until_report(&monitor, &mut registry, &mut scripts).await;
        assert!(matches!(
            reports[0].transition,
            Transition::Stopped(StopOutcome::Exited(_))
        ));
        assert!(!scripts.get(0).unwrap().running);
    }

    #[tokio::test]
    async fn scan_sweeps_records_of_removed_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(&dir, "fast.sh", "exit 0\n");
        let mut scripts = list_with(&dir, &[&script]);
        let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_secs(1));
        let monitor = ProcessMonitor::default();

        registry.start(&script).await.unwrap();
        scan_until_report(&monitor, &mut registry, &mut scripts).await;
        scripts.remove(0).unwrap();
        monitor.scan(&mut registry, &mut scripts).await;
        assert!(registry.is_empty());
    }

    #[test]
    fn interval_has_a_floor() {
        assert_eq!(
            ProcessMonitor::new(Duration::ZERO).interval(),
            Duration::from_millis(100)
        );
        assert_eq!(ProcessMonitor::default().interval(), Duration::from_secs(6));
    }
}
