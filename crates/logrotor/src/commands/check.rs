//! Check command implementation - dry run that touches nothing

use anyhow::Result;
use chrono::Utc;
use logrotor_engine::Engine;
use logrotor_hooks::ShellRunner;
use logrotor_state::StateStore;

use super::{missing_compressors, Setup};
use crate::cli::RunArgs;
use crate::output::{print_plan, print_warning};

pub fn execute(args: RunArgs) -> Result<()> {
    let setup = Setup::load(args.config.as_deref(), args.state)?;
    let state = StateStore::load(&setup.state_path)?;

    let runner = ShellRunner;
    let plan = Engine::new(&runner)
        .with_force(args.force)
        .plan(&setup.groups, &state, Utc::now());

    print_plan(&plan);
    for warning in missing_compressors(&setup.groups) {
        print_warning(&warning);
    }
    Ok(())
}
