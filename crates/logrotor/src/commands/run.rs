//! Run command implementation - rotate everything that is due

use anyhow::{bail, Context, Result};
use logrotor_engine::Engine;
use logrotor_hooks::ShellRunner;
use logrotor_state::StateStore;
use std::fs;
use tracing::{info, warn};

use super::{missing_compressors, Setup};
use crate::cli::RunArgs;
use crate::lock::RunLock;
use crate::output::print_run_report;

pub fn execute(args: RunArgs) -> Result<()> {
    let setup = Setup::load(args.config.as_deref(), args.state)?;

    if let Some(parent) = setup.state_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }
    for warning in missing_compressors(&setup.groups) {
        warn!("{}", warning);
    }
    let _lock = RunLock::acquire(&setup.state_path)?;

    let state = StateStore::load(&setup.state_path)?;
    info!(
        "Loaded {} state record(s) from {}",
        state.len(),
        setup.state_path.display()
    );

    let runner = ShellRunner;
    let engine = Engine::new(&runner).with_force(args.force);
    let (state, report) = engine.run(&setup.groups, state);

    // Persist even after failures; completed rotations must not repeat
    let saved = state.save(&setup.state_path);
    print_run_report(&report);
    saved?;

    if !report.is_success() {
        bail!("{} error(s) during rotation", report.errors.len());
    }
    Ok(())
}
