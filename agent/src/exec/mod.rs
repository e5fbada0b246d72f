//! External command execution

pub mod command;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{run_checked, CommandOutput, CommandRunner, CommandSpec, SystemRunner};
