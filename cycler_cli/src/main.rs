mod cli;
mod error_fmt;
mod hw;
mod logging;
mod run;

use clap::Parser;
use eyre::Result;

use crate::cli::{Cli, Commands, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::{Overrides, RunOpts};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        // Pretty reports only; JSON mode prints its own error objects.
        let _ = color_eyre::install();
    }

    if let Err(e) = real_main(cli) {
        let code = exit_code_for_error(&e);
        if json_mode() {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(code);
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = cycler_config::load_file(&cli.config)?;
    logging::init(&cli.log_level, cli.json, &cfg.logging)?;
    tracing::info!(config = %cli.config.display(), kind = ?cfg.actuator.kind, "config loaded");

    match cli.cmd {
        Commands::Run {
            total_s,
            interval_s,
            repeat,
            auto_start,
            exit_on_complete,
        } => run::run(
            &cfg,
            RunOpts {
                overrides: Overrides {
                    total_s,
                    interval_s,
                    repeat,
                },
                auto_start,
                exit_on_complete,
            },
        ),
        Commands::SelfCheck => run::self_check(&cfg),
        Commands::HoldTime { interval_s, repeat } => run::hold_time(&cfg, interval_s, repeat),
    }
}
