mod check;
mod context;
mod detect;
mod generate;
mod init;
mod plan;
mod stacks;

pub use check::check;
pub use detect::detect;
pub use generate::generate;
pub use init::init_project;
pub use plan::plan;
pub use stacks::stacks;
