//! Command-line interface.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Report, Result, WrapErr};

use crate::expander::Expander;
use crate::registry::builtin_names;

#[derive(Parser)]
#[command(
    name = "ctex",
    version,
    about = "Compile-time source-to-source macro expansion"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a file, evaluate the result, and print its stable form.
    Run { file: PathBuf },
    /// Print the expanded source text without evaluating it.
    Expand { file: PathBuf },
    /// Print the expansion trace as JSON.
    Trace { file: PathBuf },
    /// List the built-in macros.
    List,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { file } => {
            let source = read_source(&file)?;
            let mut expander = Expander::new();
            let produced = expander.expand(&source).map_err(Report::new)?;
            println!("{}", produced);
        }
        Command::Expand { file } => {
            let source = read_source(&file)?;
            let mut expander = Expander::new();
            let expanded = expander.expand_text(&source).map_err(Report::new)?;
            println!("{}", expanded);
        }
        Command::Trace { file } => {
            let source = read_source(&file)?;
            let mut expander = Expander::new();
            let (_, trace) = expander.expand_traced(&source).map_err(Report::new)?;
            let json = serde_json::to_string_pretty(&trace).into_diagnostic()?;
            println!("{}", json);
        }
        Command::List => {
            for name in builtin_names() {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", path.display()))
}
