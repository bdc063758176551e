//! devserve entry point: argument parsing, logging, command dispatch and
//! exit codes.

use clap::Parser;
use devserve::server::Outcome;
use devserve::{cli, commands, error, logger, ui};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();

    logger::init_logger(logger::Verbosity::from_flags(args.verbose, args.quiet), args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Start(start_args) => commands::start_execute(start_args).await,
        cli::Command::Plan(project_args) => commands::plan_execute(project_args)
            .await
            .map(|()| Outcome::Stopped),
    };

    match result {
        Ok(Outcome::Stopped) | Ok(Outcome::NoPortAvailable) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", error::to_miette(err));
            ExitCode::from(code)
        }
    }
}
