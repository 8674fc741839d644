use anyhow::Result;
use clap::{CommandFactory as _, Parser as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cfgctl::cli::{Cli, Command};
use cfgctl::commands::{self, CommandSetup, symlinks::SymlinkAction};
use cfgctl::logging::{Log, Logger, init_subscriber};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    match args.command {
        Command::Version => {
            let version = option_env!("CFGCTL_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
            println!("cfgctl {version}");
            return Ok(());
        }
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "cfgctl", &mut std::io::stdout());
            return Ok(());
        }
        Command::Format | Command::Symlinks(_) | Command::Handlers => {}
    }

    let name = args.command.log_name();
    init_subscriber(args.verbose, name);
    let log = Arc::new(Logger::new(name));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        let handler_log = Arc::clone(&log);
        if let Err(e) = ctrlc::set_handler(move || {
            handler_log.warn("interrupted, waiting for running jobs to finish");
            cancel.store(true, Ordering::SeqCst);
        }) {
            log.debug(&format!("cannot install interrupt handler: {e}"));
        }
    }

    let setup = CommandSetup::init(&args.global, Arc::clone(&log) as Arc<dyn Log>, cancel)?;
    let ctx = &setup.ctx;

    match args.command {
        Command::Format => commands::format::run(ctx)?,
        Command::Symlinks(opts) => {
            commands::symlinks::run(ctx, SymlinkAction::from(opts.action))?;
        }
        Command::Handlers => return commands::handlers::run(ctx),
        Command::Version | Command::Completions { .. } => {}
    }

    commands::finish(&log)
}
