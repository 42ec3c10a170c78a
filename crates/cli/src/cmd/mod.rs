mod build;
mod console;
mod dashboard;
mod package;
mod service;
mod submit;

pub use build::{TargetArgs, cmd_build};
pub use console::cmd_console;
pub use dashboard::cmd_dashboard;
pub use package::cmd_package;
pub use service::{Reported, ServiceArgs};
pub use submit::cmd_submit;
