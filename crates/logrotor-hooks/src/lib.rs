//! logrotor Hooks - external command execution for hooks and compression
//!
//! Everything that spawns a process goes through [`CommandRunner`], so the
//! engine can be driven by [`RecordingRunner`] in tests.

pub mod hook;
pub mod mock;
pub mod shell;
pub mod traits;

pub use hook::{hook_command, run_hook};
pub use mock::RecordingRunner;
pub use shell::ShellRunner;
pub use traits::{CommandRunner, CommandSpec, CommandStatus};
