mod args;
mod paths;

pub use args::{Cli, Commands, SessionArgs};
pub use paths::{resolve_profile_dir, resolve_workspace};
