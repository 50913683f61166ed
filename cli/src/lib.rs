pub mod command;
pub mod shell;

pub use command::{parse_command, Command};
pub use shell::Shell;
