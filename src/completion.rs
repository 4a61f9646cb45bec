//! The `completions` subcommand, backed by clap_complete.

use std::fs;
use std::io;

use anyhow::{bail, Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, generate_to};

use crate::cli::{Cli, CompletionsArgs};

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    match (args.stdout, args.out_dir) {
        (true, _) => {
            generate(args.shell, &mut cmd, name, &mut io::stdout());
        }
        (false, Some(dir)) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("create {}", dir.display()))?;
            let written = generate_to(args.shell, &mut cmd, name, &dir)
                .context("write completion script")?;
            eprintln!("wrote {}", written.display());
        }
        (false, None) => bail!("pass --out-dir or --stdout"),
    }
    Ok(())
}
