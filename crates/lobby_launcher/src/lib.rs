//! Game process launching: command-line assembly and the single-child
//! supervisor.

pub mod command;
pub mod supervisor;

pub use command::{GameCommand, LaunchPlan};
pub use supervisor::{ExitNotice, Generation, Launcher, MockLauncher, Supervisor};
