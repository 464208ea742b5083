use clap::Parser;

use ctex::cli::{self, Cli};

fn main() -> miette::Result<()> {
    cli::run(Cli::parse())
}
