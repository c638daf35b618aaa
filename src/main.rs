use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use clonekit::{
    cli::{
        args::{CliArgs, Command},
        command_handlers::do_clone,
        runtime,
    },
    config::ClonekitConfig,
    git::GitCloneService,
};
use log::error;

fn run() -> anyhow::Result<()> {
    let cli_args: CliArgs = CliArgs::parse();
    let config = ClonekitConfig::load(cli_args.config)?;

    match cli_args.cmd {
        Command::Clone(args) => {
            let config = args.apply(config);
            let destination =
                runtime::block_on(do_clone(&config, Arc::new(GitCloneService::new())))??;
            println!("{}", destination.display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
