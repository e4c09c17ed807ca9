use clap::Parser as ClapParser;
use smplc::driver::{Cli, Driver};

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    let driver = Driver::new(cli);
    match driver.run() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
