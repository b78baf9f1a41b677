use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory};
use clap_complete::{Shell, generate};

use crate::cli::app::App;

#[derive(Args, Clone, Debug)]
pub struct SetupArg {
    #[arg(long, help = "Shell to generate completion for, detected when omitted")]
    shell: Option<Shell>,
}

pub fn setup(arg: SetupArg) -> Result<()> {
    let shell = match arg.shell {
        Some(s) => s,
        None => detect_shell()?,
    };

    let mut c = App::command();
    let mut stdio = std::io::stdout();
    generate(shell, &mut c, "aipsync", &mut stdio);

    Ok(())
}

fn detect_shell() -> Result<Shell> {
    let shell = query_shell::get_shell().context("Failed to detect shell, pass --shell")?;
    let shell = match shell {
        query_shell::Shell::Bash => Shell::Bash,
        query_shell::Shell::Elvish => Shell::Elvish,
        query_shell::Shell::Fish => Shell::Fish,
        query_shell::Shell::Powershell => Shell::PowerShell,
        query_shell::Shell::Zsh => Shell::Zsh,
        _ => bail!("No completion available for the detected shell, pass --shell"),
    };
    Ok(shell)
}
