mod cli;
mod driver;

pub use cli::Cli;
pub use driver::Driver;
