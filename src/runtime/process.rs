//! Process metric source
//!
//! Reads the calling process from procfs, plus the worker and task counts of
//! the tokio runtime it is called from. Readings that cannot be taken (no
//! procfs, parse failure, no runtime) are reported as [`SampleValue::Bad`]
//! so the set of names stays stable across platforms.

use std::fs;
use std::path::PathBuf;

use tokio::runtime::Handle;
use tracing::debug;

use crate::runtime::{RuntimeMetricSource, RuntimeSample, SampleValue};

/// Kernel clock ticks per second (`USER_HZ`), fixed at 100 on Linux.
const CLOCK_TICKS_PER_SECOND: f64 = 100.0;

/// Position of `utime` among the `/proc/self/stat` fields following the
/// command name.
const STAT_UTIME_INDEX: usize = 11;
const STAT_STIME_INDEX: usize = 12;

pub struct ProcessMetricSource {
    proc_dir: PathBuf,
}

impl ProcessMetricSource {
    pub fn new() -> Self {
        Self::with_proc_dir("/proc/self")
    }

    /// Read from another procfs process directory
    pub fn with_proc_dir(proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            proc_dir: proc_dir.into(),
        }
    }

    fn read_file(&self, name: &str) -> Option<String> {
        match fs::read_to_string(self.proc_dir.join(name)) {
            Ok(content) => Some(content),
            Err(e) => {
                debug!(file = name, error = %e, "Process metric file unreadable");
                None
            }
        }
    }

    fn cpu_samples(&self) -> [RuntimeSample; 2] {
        let times = self.read_file("stat").and_then(|stat| parse_cpu_seconds(&stat));

        let (user, system) = match times {
            Some((user, system)) => (SampleValue::Float64(user), SampleValue::Float64(system)),
            None => (SampleValue::Bad, SampleValue::Bad),
        };

        [
            RuntimeSample::new("/process/cpu/user:seconds", true, user),
            RuntimeSample::new("/process/cpu/system:seconds", true, system),
        ]
    }

    fn status_samples(&self) -> Vec<RuntimeSample> {
        let status = self.read_file("status").unwrap_or_default();
        let field = |key: &str| match status_field(&status, key) {
            Some(value) => SampleValue::UInt64(value),
            None => SampleValue::Bad,
        };
        let kib_field = |key: &str| match status_field(&status, key) {
            Some(value) => SampleValue::UInt64(value.saturating_mul(1024)),
            None => SampleValue::Bad,
        };

        vec![
            RuntimeSample::new("/process/threads:threads", false, field("Threads")),
            RuntimeSample::new("/process/memory/resident:bytes", false, kib_field("VmRSS")),
            RuntimeSample::new("/process/memory/virtual:bytes", false, kib_field("VmSize")),
            RuntimeSample::new(
                "/process/context-switches/voluntary:switches",
                true,
                field("voluntary_ctxt_switches"),
            ),
            RuntimeSample::new(
                "/process/context-switches/involuntary:switches",
                true,
                field("nonvoluntary_ctxt_switches"),
            ),
        ]
    }

    fn fd_sample(&self) -> RuntimeSample {
        let value = match fs::read_dir(self.proc_dir.join("fd")) {
            Ok(entries) => SampleValue::UInt64(entries.count() as u64),
            Err(e) => {
                debug!(error = %e, "Process fd directory unreadable");
                SampleValue::Bad
            }
        };
        RuntimeSample::new("/process/open-fds:files", false, value)
    }

    fn tokio_samples(&self) -> [RuntimeSample; 2] {
        let (workers, alive) = match Handle::try_current() {
            Ok(handle) => {
                let metrics = handle.metrics();
                (
                    SampleValue::UInt64(metrics.num_workers() as u64),
                    SampleValue::UInt64(metrics.num_alive_tasks() as u64),
                )
            }
            Err(_) => (SampleValue::Bad, SampleValue::Bad),
        };

        [
            RuntimeSample::new("/tokio/workers:threads", false, workers),
            RuntimeSample::new("/tokio/tasks/alive:tasks", false, alive),
        ]
    }
}

impl Default for ProcessMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeMetricSource for ProcessMetricSource {
    fn read(&self) -> Vec<RuntimeSample> {
        let mut samples = Vec::with_capacity(10);
        samples.extend(self.cpu_samples());
        samples.extend(self.status_samples());
        samples.push(self.fd_sample());
        samples.extend(self.tokio_samples());
        samples
    }
}

/// User and system CPU seconds from the content of `/proc/<pid>/stat`.
fn parse_cpu_seconds(stat: &str) -> Option<(f64, f64)> {
    // The command name may contain spaces and parentheses; fields resume
    // after the last ')'.
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();

    let utime: u64 = fields.get(STAT_UTIME_INDEX)?.parse().ok()?;
    let stime: u64 = fields.get(STAT_STIME_INDEX)?.parse().ok()?;

    Some((
        utime as f64 / CLOCK_TICKS_PER_SECOND,
        stime as f64 / CLOCK_TICKS_PER_SECOND,
    ))
}

/// Leading integer of a `Key:\tvalue [unit]` line of `/proc/<pid>/status`.
fn status_field(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim() != key {
            return None;
        }
        value.split_whitespace().next()?.parse().ok()
    })
}
