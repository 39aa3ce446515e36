// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Configuration data model (`spec.md` §3).
//!
//! ```text
//! GlobalConfig: hosts: BTreeMap<String, Host>, defaults: FleetDefaults
//! ProjectConfig: host/hosts, sync, lock, tasks, output, monitor, require
//! Task: description/hosts/env/require/fail_fast/timeout/max_parallel + TaskBody
//! TaskBody: Run | Steps | Parallel | DependsOnly | DependsWithBody
//! DependencyItem: Single(name) | Parallel([name…])   (untagged)
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One logical remote host (`spec.md` §3 "Host").
///
/// **Invariant** (enforced by [`crate::config::validator`], not at
/// deserialize time): at least one alias, non-empty `dir`, and `shell` (if
/// present) ends in a token starting with `-`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Host {
    /// Connection aliases tried in order by the prober.
    pub aliases: Vec<String>,
    /// Remote working directory template.
    pub dir: String,
    /// Arbitrary labels used for host-restriction filtering.
    pub tags: Vec<String>,
    /// Per-host environment variables.
    pub env: BTreeMap<String, String>,
    /// Shell invocation template, e.g. `"bash -l -c"`. Defaults to `sh -c`.
    pub shell: Option<String>,
    /// Commands prepended to every task run on this host, joined with `&&`.
    pub setup: Vec<String>,
}

impl Host {
    /// The shell invocation template, falling back to a POSIX default.
    #[must_use]
    pub fn shell_or_default(&self) -> &str {
        self.shell.as_deref().unwrap_or("sh -c")
    }
}

/// `on_fail` policy for one step in a `Task::Steps` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnFail {
    #[default]
    Stop,
    Continue,
}

/// One step in a `steps` task body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Step {
    pub run: String,
    pub on_fail: OnFail,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            run: String::new(),
            on_fail: OnFail::Stop,
        }
    }
}

/// Either a single task name or a parallel group of names (`spec.md` §3
/// "DependencyItem"). A bare YAML string is `Single`; a YAML list is
/// `Parallel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyItem {
    Single(String),
    Parallel(Vec<String>),
}

impl DependencyItem {
    /// The task names named by this item (one for `Single`, several for
    /// `Parallel`).
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Parallel(names) => names,
        }
    }
}

/// A body that may follow a non-empty `depends` list: either a single
/// command or an ordered list of steps. `parallel` and nested `depends`
/// bodies are not permitted here (`spec.md` §3's mutual-exclusion rules).
#[derive(Debug, Clone)]
pub enum RunOrSteps {
    Run(String),
    Steps(Vec<Step>),
}

/// The tagged union of task shapes (`spec.md` §3, §9).
#[derive(Debug, Clone)]
pub enum TaskBody {
    /// A single command.
    Run(String),
    /// An ordered list of steps, each with its own `on_fail` policy.
    Steps(Vec<Step>),
    /// A list of task names run concurrently. Nested `parallel` references
    /// are permitted and flattened (`spec.md` §4.2's permissive policy);
    /// direct duplicates are intentional and preserved.
    Parallel(Vec<String>),
    /// A dependency chain with no body of its own.
    DependsOnly(Vec<DependencyItem>),
    /// A dependency chain followed by a `run`/`steps` body that executes
    /// after the dependencies complete.
    DependsWithBody(Vec<DependencyItem>, RunOrSteps),
    /// No shape at all: a task usable only as a bare placeholder name.
    Empty,
}

impl TaskBody {
    /// True for every shape except `DependsOnly` and `Empty` — these are the
    /// shapes the resolver appends a stage for (`spec.md` §4.5 step 3).
    #[must_use]
    pub const fn has_body(&self) -> bool {
        matches!(
            self,
            Self::Run(_) | Self::Steps(_) | Self::Parallel(_) | Self::DependsWithBody(..)
        )
    }

    /// The `depends` list, if this shape carries one.
    #[must_use]
    pub fn depends(&self) -> &[DependencyItem] {
        match self {
            Self::DependsOnly(items) | Self::DependsWithBody(items, _) => items,
            _ => &[],
        }
    }

    /// The `parallel` member list, if this is a `Parallel` task.
    #[must_use]
    pub fn parallel_members(&self) -> Option<&[String]> {
        match self {
            Self::Parallel(members) => Some(members),
            _ => None,
        }
    }

    fn from_raw(
        run: Option<String>,
        steps: Option<Vec<Step>>,
        parallel: Option<Vec<String>>,
        depends: Option<Vec<DependencyItem>>,
    ) -> Result<Self, String> {
        if run.is_some() && steps.is_some() {
            return Err("'run' and 'steps' are mutually exclusive".to_string());
        }
        if parallel.is_some() && (run.is_some() || steps.is_some() || depends.is_some()) {
            return Err(
                "'parallel' is mutually exclusive with 'run', 'steps', and 'depends'".to_string(),
            );
        }
        if let Some(members) = parallel {
            return Ok(Self::Parallel(members));
        }
        let body = match (run, steps) {
            (Some(cmd), None) => Some(RunOrSteps::Run(cmd)),
            (None, Some(steps)) => Some(RunOrSteps::Steps(steps)),
            (None, None) => None,
            (Some(_), Some(_)) => unreachable!("checked above"),
        };
        match (depends, body) {
            (Some(items), Some(body)) => Ok(Self::DependsWithBody(items, body)),
            (Some(items), None) => Ok(Self::DependsOnly(items)),
            (None, Some(RunOrSteps::Run(cmd))) => Ok(Self::Run(cmd)),
            (None, Some(RunOrSteps::Steps(steps))) => Ok(Self::Steps(steps)),
            (None, None) => Ok(Self::Empty),
        }
    }
}

/// A named task (`spec.md` §3 "Task").
#[derive(Debug, Clone)]
pub struct Task {
    pub description: String,
    /// Host-restriction list. Empty means "eligible on any host".
    pub hosts: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub require: Vec<String>,
    pub fail_fast: bool,
    pub timeout_secs: Option<u64>,
    pub max_parallel: Option<usize>,
    pub body: TaskBody,
}

impl Task {
    #[must_use]
    pub const fn has_body(&self) -> bool {
        self.body.has_body()
    }

    #[must_use]
    pub fn depends(&self) -> &[DependencyItem] {
        self.body.depends()
    }
}

/// Raw, field-for-field deserialization target for [`Task`]; [`Task`] itself
/// deserializes through this and then resolves [`TaskBody::from_raw`],
/// mirroring the teacher's hand-rolled `FromStr`/`TryFrom` enum conversions.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawTask {
    description: String,
    hosts: Vec<String>,
    env: BTreeMap<String, String>,
    require: Vec<String>,
    fail_fast: bool,
    timeout_secs: Option<u64>,
    max_parallel: Option<usize>,
    run: Option<String>,
    steps: Option<Vec<Step>>,
    parallel: Option<Vec<String>>,
    depends: Option<Vec<DependencyItem>>,
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawTask::deserialize(deserializer)?;
        let body = TaskBody::from_raw(raw.run, raw.steps, raw.parallel, raw.depends)
            .map_err(serde::de::Error::custom)?;
        Ok(Self {
            description: raw.description,
            hosts: raw.hosts,
            env: raw.env,
            require: raw.require,
            fail_fast: raw.fail_fast,
            timeout_secs: raw.timeout_secs,
            max_parallel: raw.max_parallel,
            body,
        })
    }
}

impl Serialize for Task {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry("hosts", &self.hosts)?;
        map.serialize_entry("env", &self.env)?;
        map.serialize_entry("require", &self.require)?;
        map.serialize_entry("fail_fast", &self.fail_fast)?;
        map.serialize_entry("timeout_secs", &self.timeout_secs)?;
        map.serialize_entry("max_parallel", &self.max_parallel)?;
        match &self.body {
            TaskBody::Run(cmd) => map.serialize_entry("run", cmd)?,
            TaskBody::Steps(steps) => map.serialize_entry("steps", steps)?,
            TaskBody::Parallel(members) => map.serialize_entry("parallel", members)?,
            TaskBody::DependsOnly(items) => map.serialize_entry("depends", items)?,
            TaskBody::DependsWithBody(items, body) => {
                map.serialize_entry("depends", items)?;
                match body {
                    RunOrSteps::Run(cmd) => map.serialize_entry("run", cmd)?,
                    RunOrSteps::Steps(steps) => map.serialize_entry("steps", steps)?,
                }
            }
            TaskBody::Empty => {}
        }
        map.end()
    }
}

/// Fleet-wide defaults (`spec.md` §3 "Config (two-level)" — Global).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetDefaults {
    /// Probe timeout applied to every alias (`spec.md` §4.3).
    pub probe_timeout_secs: u64,
    /// Fall back to local execution when no hosts are configured/reachable.
    pub local_fallback: bool,
    /// Tiebreak order for `orderedHostNames()` (`spec.md` §4.4).
    pub host_priority: Vec<String>,
}

impl Default for FleetDefaults {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 5,
            local_fallback: false,
            host_priority: Vec::new(),
        }
    }
}

/// Global, fleet-wide configuration (`<home>/.rr/config.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub version: u32,
    pub hosts: BTreeMap<String, Host>,
    pub defaults: FleetDefaults,
}

/// File-sync preferences for the remote transport's `CopyDir`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Glob patterns excluded from sync.
    pub exclude: Vec<String>,
    /// Glob patterns re-included after an exclude (rsync-style override).
    pub include: Vec<String>,
    /// Patterns whose existing remote copies are preserved (never deleted).
    pub preserve: Vec<String>,
}

/// Distributed lock policy (`spec.md` §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Lock directory root on the remote host.
    pub dir: String,
    /// Age after which a held lock is considered stale and force-broken.
    pub stale_secs: u64,
    /// How long one acquisition attempt waits for a fresh holder.
    pub timeout_secs: u64,
    /// Bound on the multi-host round-robin fallback.
    pub wait_timeout_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            dir: "/tmp/rr-locks".to_string(),
            stale_secs: 300,
            timeout_secs: 30,
            wait_timeout_secs: 120,
        }
    }
}

/// Output/progress-rendering preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub quiet: bool,
    pub show_timestamps: bool,
}

/// Health-monitoring thresholds (`spec.md` §4.2 "Monitor").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Percentage (0-100); 0 disables the warning threshold.
    pub warning_pct: u8,
    /// Percentage (0-100); 0 disables the critical threshold.
    pub critical_pct: u8,
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warning_pct: 0,
            critical_pct: 0,
            interval_secs: 30,
        }
    }
}

/// Per-project configuration (`.rr.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub version: u32,
    /// Single preferred host, if set.
    pub host: Option<String>,
    /// Candidate host list, used when `host` is unset.
    pub hosts: Vec<String>,
    pub sync: SyncConfig,
    pub lock: LockConfig,
    pub tasks: BTreeMap<String, Task>,
    pub output: OutputConfig,
    pub monitor: MonitorConfig,
    pub require: Vec<String>,
    pub local_fallback: bool,
    /// Project-wide environment defaults, between `host.env` and a task's own
    /// `env` in the merge precedence (`spec.md` §4.6: host ≺ project ≺ task).
    pub env: BTreeMap<String, String>,
}

/// Which file(s) a resolved value came from, for diagnostics
/// (`spec.md` §3 "Resolved config").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    GlobalOnly,
    ProjectOnly,
    Both,
}

#[cfg(test)]
mod tests;
