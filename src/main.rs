use clap::Parser;
use rltune::cli::{self, Options};

fn main() -> Result<(), rltune::Error> {
    let opts = Options::parse();
    cli::run(&opts)?;
    Ok(())
}
