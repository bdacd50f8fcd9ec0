//! Group-level rotation driver

use chrono::{DateTime, Utc};
use logrotor_core::{Error, HookStage, LogGroup};
use logrotor_glob::{resolve, ResolvedGroup};
use logrotor_hooks::{run_hook, CommandRunner};
use logrotor_state::StateStore;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info};

use crate::executor::{needs_recovery, Executor};
use crate::policy::{evaluate, Decision, FileStat, SkipReason, Trigger};
use crate::report::{Outcome, RunReport};

/// One line of a dry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub group: String,
    pub path: PathBuf,
    pub decision: Decision,
    /// The live file would be recreated after an interrupted rotation
    pub recover: bool,
}

impl PlanEntry {
    pub fn label(&self) -> String {
        if self.recover {
            "recover".to_string()
        } else {
            self.decision.label()
        }
    }
}

enum Work {
    Rotate(PathBuf, FileStat, Trigger),
    Recover(PathBuf),
}

impl Work {
    fn path(&self) -> &PathBuf {
        match self {
            Work::Rotate(path, _, _) | Work::Recover(path) => path,
        }
    }
}

/// The rotation engine. Holds no state of its own between runs.
pub struct Engine<'a> {
    runner: &'a dyn CommandRunner,
    /// Rotate every eligible file regardless of its triggers
    force: bool,
}

impl<'a> Engine<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Rotate everything that is due now
    pub fn run(&self, groups: &[LogGroup], state: StateStore) -> (StateStore, RunReport) {
        self.run_at(groups, state, Utc::now())
    }

    /// Rotate everything that is due at `now`.
    ///
    /// Every file is attempted even when others fail. The returned store
    /// holds the updated records and is for the caller to persist.
    pub fn run_at(
        &self,
        groups: &[LogGroup],
        mut state: StateStore,
        now: DateTime<Utc>,
    ) -> (StateStore, RunReport) {
        let mut report = RunReport::new();
        for (group, files) in groups.iter().zip(resolve(groups)) {
            self.run_group(group, &files, &mut state, &mut report, now);
        }
        info!(
            "Run finished: {} rotated, {} recovered, {} failed",
            report.count(Outcome::Rotated),
            report.count(Outcome::Recovered),
            report.count(Outcome::Failed)
        );
        (state, report)
    }

    /// Evaluate every file without changing anything
    pub fn plan(&self, groups: &[LogGroup], state: &StateStore, now: DateTime<Utc>) -> Vec<PlanEntry> {
        let mut entries = Vec::new();
        for (group, files) in groups.iter().zip(resolve(groups)) {
            let d = &group.directives;
            for path in &files.excluded {
                entries.push(PlanEntry {
                    group: group.name.clone(),
                    path: path.clone(),
                    decision: Decision::Skip(SkipReason::Excluded),
                    recover: false,
                });
            }
            for path in &files.files {
                let stat = FileStat::read(path).ok().flatten();
                let record = state.get(path);
                let recover = stat.is_none() && needs_recovery(path, d, record).unwrap_or(false);
                entries.push(PlanEntry {
                    group: group.name.clone(),
                    path: path.clone(),
                    decision: evaluate(path, stat.as_ref(), record, d, now, self.force),
                    recover,
                });
            }
        }
        entries
    }

    fn run_group(
        &self,
        group: &LogGroup,
        files: &ResolvedGroup,
        state: &mut StateStore,
        report: &mut RunReport,
        now: DateTime<Utc>,
    ) {
        let d = &group.directives;
        let name = group.name.as_str();

        for path in &files.excluded {
            report.skipped(name, path, SkipReason::Excluded);
        }

        let mut work = Vec::new();
        for path in &files.files {
            let stat = match FileStat::read(path) {
                Ok(stat) => stat,
                Err(e) => {
                    report.failed(name, path, Error::fs("stat", path)(e));
                    continue;
                }
            };
            let record = state.get(path);

            if stat.is_none() {
                match needs_recovery(path, d, record) {
                    Ok(true) => {
                        work.push(Work::Recover(path.clone()));
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        report.failed(name, path, e);
                        continue;
                    }
                }
            }

            match evaluate(path, stat.as_ref(), record, d, now, self.force) {
                Decision::Skip(SkipReason::Missing) => match d.missing.handle(path) {
                    Some(err) => {
                        error!("{}", err);
                        report.failed(name, path, err);
                    }
                    None => report.skipped(name, path, SkipReason::Missing),
                },
                Decision::Skip(reason) => {
                    debug!("{}: {}", path.display(), reason.as_str());
                    report.skipped(name, path, reason);
                }
                Decision::RotateNow(trigger) => {
                    if let Some(stat) = stat {
                        work.push(Work::Rotate(path.clone(), stat, trigger));
                    }
                }
            }
        }

        if work.is_empty() {
            return;
        }
        let hooks = &d.hooks;
        let due: Vec<PathBuf> = work.iter().map(|w| w.path().clone()).collect();

        if let Some(script) = hooks.first_action.as_deref() {
            if let Err(e) = run_hook(self.runner, HookStage::FirstAction, script, name, &due) {
                error!("{}", e);
                for path in &due {
                    report.push(name, path, Outcome::Aborted, e.to_string());
                }
                report.error(Error::GroupAborted {
                    group: name.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        }

        if d.shared_hooks {
            if let Some(script) = hooks.pre_rotate.as_deref() {
                let rotating: Vec<PathBuf> = work
                    .iter()
                    .filter(|w| matches!(w, Work::Rotate(..)))
                    .map(|w| w.path().clone())
                    .collect();
                if !rotating.is_empty() {
                    if let Err(e) = run_hook(self.runner, HookStage::PreRotate, script, name, &rotating) {
                        error!("{}", e);
                        for path in &rotating {
                            report.push(name, path, Outcome::Aborted, e.to_string());
                        }
                        report.error(e);
                        work.retain(|w| matches!(w, Work::Recover(_)));
                    }
                }
            }
        }

        let executor = Executor::new(self.runner, d, now);
        let mut done = Vec::new();

        for item in work {
            let path = item.path().clone();
            let result = match item {
                Work::Rotate(path, stat, trigger) => {
                    if !d.shared_hooks {
                        if let Some(script) = hooks.pre_rotate.as_deref() {
                            let single = [path.clone()];
                            if let Err(e) = run_hook(self.runner, HookStage::PreRotate, script, name, &single) {
                                error!("{}", e);
                                report.failed(name, &path, e);
                                continue;
                            }
                        }
                    }
                    executor
                        .rotate(&path, &stat, report)
                        .map(|stamp| (stamp, Outcome::Rotated, trigger.as_str()))
                }
                Work::Recover(path) => executor
                    .recover(&path, report)
                    .map(|stamp| (stamp, Outcome::Recovered, "interrupted rotation")),
            };

            match result {
                Ok((stamp, outcome, detail)) => {
                    info!("{} {} ({})", outcome.as_str(), path.display(), detail);
                    if !d.shared_hooks {
                        if let Some(script) = hooks.post_rotate.as_deref() {
                            let single = [path.clone()];
                            if let Err(e) = run_hook(self.runner, HookStage::PostRotate, script, name, &single) {
                                error!("{}", e);
                                report.error(e);
                            }
                        }
                    }
                    state.record_rotation(&path, stamp);
                    report.push(name, &path, outcome, detail.to_string());
                    done.push(path);
                }
                Err(e) => {
                    error!("Rotation of {} failed: {}", path.display(), e);
                    report.failed(name, &path, e);
                }
            }
        }

        if done.is_empty() {
            return;
        }
        if d.shared_hooks {
            if let Some(script) = hooks.post_rotate.as_deref() {
                if let Err(e) = run_hook(self.runner, HookStage::PostRotate, script, name, &done) {
                    error!("{}", e);
                    report.error(e);
                }
            }
        }
        if let Some(script) = hooks.last_action.as_deref() {
            if let Err(e) = run_hook(self.runner, HookStage::LastAction, script, name, &done) {
                error!("{}", e);
                report.error(e);
            }
        }
    }
}
