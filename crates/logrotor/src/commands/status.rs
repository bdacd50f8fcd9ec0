//! Status command implementation - print the state table

use anyhow::Result;
use logrotor_state::StateStore;

use super::{base_dir, default_state_path, load_config, state_path};
use crate::cli::StatusArgs;
use crate::output::print_state_table;

pub fn execute(args: StatusArgs) -> Result<()> {
    let path = match (args.state, args.config) {
        (Some(state), _) => state,
        (None, Some(config)) => {
            let (file, config_path) = load_config(Some(&config))?;
            state_path(None, file.state_file, &base_dir(&config_path))
        }
        (None, None) => default_state_path(),
    };

    let state = StateStore::load(&path)?;
    print_state_table(&state);
    Ok(())
}
