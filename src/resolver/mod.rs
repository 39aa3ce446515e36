// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Dependency resolver (`spec.md` §4.5): compiles a task plus its transitive
//! `depends` list into an ordered [`ExecutionPlan`].
//!
//! ```text
//! resolve(tasks, target, opts) -> ExecutionPlan
//!   opts.skip_deps       -- just the target, if it has a body
//!   depth-first walk of `depends`
//!     Single      -- recurse, then append a sequential stage
//!     Parallel    -- recurse each member, then append one parallel stage
//!   trailing stage for the target itself, if it has a body
//!   opts.from            -- trim stages before the first one containing it
//!   dedup                -- keep first occurrence, drop now-empty stages
//!
//! flatten_parallel_tasks(tasks, name) -- expands `parallel`-type tasks into
//!   a flat leaf list, preserving repetition (distinct from `depends`
//!   resolution above)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::types::{DependencyItem, Task};
use crate::error::{RrResult, TaskError};

/// A contiguous group of tasks in a plan, sequential or parallel
/// (`spec.md` §3 "ExecutionPlan").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub tasks: Vec<String>,
    pub parallel: bool,
}

/// An ordered list of stages produced by [`resolve`] for one target task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub stages: Vec<Stage>,
}

impl ExecutionPlan {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for ExecutionPlan {
    /// `"1. <task>, 2. [<t1>, <t2>] (parallel), 3. <task>"` (`spec.md` §4.5).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                if stage.parallel {
                    format!("{}. [{}] (parallel)", i + 1, stage.tasks.join(", "))
                } else {
                    format!("{}. {}", i + 1, stage.tasks.join(", "))
                }
            })
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}

/// Options controlling plan construction (`spec.md` §4.5).
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub skip_deps: bool,
    pub from: Option<String>,
}

/// Builds the ordered stage list for `target` (`spec.md` §4.5's algorithm).
///
/// # Errors
///
/// Returns [`TaskError::NotFound`] if `target` is undefined, or
/// [`TaskError::NotInChain`] if `opts.from` names a task absent from the
/// resulting plan.
pub fn resolve(tasks: &BTreeMap<String, Task>, target: &str, opts: &ResolveOptions) -> RrResult<ExecutionPlan> {
    let task = tasks.get(target).ok_or_else(|| TaskError::NotFound(target.to_string()))?;

    let mut stages = Vec::new();

    if opts.skip_deps {
        if task.has_body() {
            stages.push(Stage {
                tasks: vec![target.to_string()],
                parallel: false,
            });
        }
    } else {
        let mut seen = BTreeSet::new();
        for item in task.depends() {
            walk_item(tasks, item, &mut seen, &mut stages);
        }
        if task.has_body() {
            stages.push(Stage {
                tasks: vec![target.to_string()],
                parallel: false,
            });
        }
    }

    if let Some(from) = &opts.from {
        let start = stages.iter().position(|stage| stage.tasks.iter().any(|t| t == from));
        match start {
            Some(index) => stages.drain(..index),
            None => {
                return Err(TaskError::NotInChain {
                    target: target.to_string(),
                    from: from.clone(),
                }
                .into());
            }
        };
    }

    Ok(ExecutionPlan {
        stages: dedup_stages(stages),
    })
}

/// Depth-first expansion of one `depends` item, appending sequential or
/// parallel stages for members that have bodies.
fn walk_item(tasks: &BTreeMap<String, Task>, item: &DependencyItem, seen: &mut BTreeSet<String>, stages: &mut Vec<Stage>) {
    match item {
        DependencyItem::Single(name) => {
            walk_depends(tasks, name, seen, stages);
            if let Some(task) = tasks.get(name)
                && task.has_body()
            {
                stages.push(Stage {
                    tasks: vec![name.clone()],
                    parallel: false,
                });
            }
        }
        DependencyItem::Parallel(members) => {
            for member in members {
                walk_depends(tasks, member, seen, stages);
            }
            let with_bodies: Vec<String> = members
                .iter()
                .filter(|member| tasks.get(member.as_str()).is_some_and(Task::has_body))
                .cloned()
                .collect();
            if !with_bodies.is_empty() {
                stages.push(Stage {
                    tasks: with_bodies,
                    parallel: true,
                });
            }
        }
    }
}

/// Recurses into `name`'s own `depends` list, marking it seen the first time
/// it is visited (`spec.md` §4.5 step 2: "marking each task as seen the
/// first time it is visited"). Final cross-stage deduplication in
/// [`dedup_stages`] makes a separate "already emitted" check unnecessary
/// here; `seen` exists purely to bound recursion on repeated diamond shapes.
fn walk_depends(tasks: &BTreeMap<String, Task>, name: &str, seen: &mut BTreeSet<String>, stages: &mut Vec<Stage>) {
    if !seen.insert(name.to_string()) {
        return;
    }
    let Some(task) = tasks.get(name) else { return };
    for item in task.depends() {
        walk_item(tasks, item, seen, stages);
    }
}

/// Preserves stage order, dropping any task name already emitted in an
/// earlier stage; drops stages left empty by that removal
/// (`spec.md` §4.5 step 5, invariant 1).
fn dedup_stages(stages: Vec<Stage>) -> Vec<Stage> {
    let mut emitted = BTreeSet::new();
    let mut result = Vec::with_capacity(stages.len());
    for stage in stages {
        let remaining: Vec<String> = stage
            .tasks
            .into_iter()
            .filter(|name| emitted.insert(name.clone()))
            .collect();
        if !remaining.is_empty() {
            result.push(Stage {
                tasks: remaining,
                parallel: stage.parallel,
            });
        }
    }
    result
}

/// Expands a `parallel`-type task into its flat list of leaf task names,
/// recursing into members that are themselves `parallel`-type, preserving
/// repetition (`spec.md` §4.5 "Parallel flattening").
///
/// # Errors
///
/// Returns [`TaskError::NotFound`] if `name` is undefined.
pub fn flatten_parallel_tasks(tasks: &BTreeMap<String, Task>, name: &str) -> RrResult<Vec<String>> {
    let task = tasks.get(name).ok_or_else(|| TaskError::NotFound(name.to_string()))?;
    let Some(members) = task.body.parallel_members() else {
        return Ok(vec![name.to_string()]);
    };

    let mut leaves = Vec::new();
    for member in members {
        let is_nested_parallel = tasks
            .get(member.as_str())
            .is_some_and(|t| t.body.parallel_members().is_some());
        if is_nested_parallel {
            leaves.extend(flatten_parallel_tasks(tasks, member)?);
        } else {
            leaves.push(member.clone());
        }
    }
    Ok(leaves)
}
