//! cz-pane - commitizen questionnaire for Git hooks
//!
//! Without flags, opens a tmux pane next to the current one, runs
//! `cz-pane -n` in it and waits for the pane to close. With `-n`, runs the
//! questionnaire in place and saves the answer to `.git/.gitmessage`.

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};

use cz_pane::config::Config;
use cz_pane::direct::run_direct;
use cz_pane::driver::SessionPlan;
use cz_pane::embedded::run_embedded;
use cz_pane::logging;
use cz_pane::questionnaire::CommitizenCli;
use cz_pane::terminal::Tmux;
use cz_pane::watch::detector_for;

/// Run the commitizen questionnaire in a tmux pane so it can be used from a Git hook
#[derive(Parser, Debug)]
#[command(name = "cz-pane", version)]
struct Args {
    /// Do not embed in a new pane; run the questionnaire here
    #[arg(short = 'n')]
    no_embed: bool,
}

fn main() {
    let args = Args::parse();

    // Logging is best effort; the questionnaire still runs without it.
    let guard = logging::init().ok();
    let result = run(&args);
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    drop(guard);

    if let Err(err) = result {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let workdir = env::current_dir().context("determine the working directory")?;
    let config = Config::load(&workdir)?;

    if args.no_embed {
        let provider = CommitizenCli::new(&config.questionnaire, &workdir);
        run_direct(&provider, &workdir)?;
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(embed(&workdir, &config))
}

async fn embed(workdir: &Path, config: &Config) -> Result<()> {
    let program = program_name();
    let terminal = Tmux::connect(config.embed.split, config.embed.poll_interval())
        .await
        .context("connect to tmux")?;
    let plan = SessionPlan::new(workdir, &config.embed, &program);
    let mut detector = detector_for(&config.embed, &program);

    run_embedded(&terminal, &plan, detector.as_mut()).await?;
    Ok(())
}

/// Basename this binary was invoked as.
fn program_name() -> String {
    env::args_os()
        .next()
        .map(PathBuf::from)
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
