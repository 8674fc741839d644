use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::parallel::ParallelOpts;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "cfgctl",
    about = "Format a configuration repository and link its home/ tree into $HOME",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override repository root directory
    #[arg(long, global = true, env = "CFGCTL_ROOT")]
    pub root: Option<PathBuf>,

    /// Disable parallel execution (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,

    /// Maximum number of concurrent jobs (defaults to the number of CPUs)
    #[arg(short = 'j', long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Stop starting new jobs after the first failure
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Kill any formatter still running after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    /// Worker pool policy for these options, sharing `cancel` as the interrupt flag.
    #[must_use]
    pub fn parallel_opts(&self, cancel: Arc<AtomicBool>) -> ParallelOpts {
        let defaults = ParallelOpts::default();
        ParallelOpts {
            parallel: self.parallel,
            threads: self.jobs.map_or(defaults.threads, usize::from),
            fail_fast: self.fail_fast,
            cancel,
        }
    }

    /// Per-process timeout, if given.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Format every file a handler rule matches
    #[command(visible_aliases = ["f", "fmt"])]
    Format,
    /// Create or remove links from $HOME into the repository's home/ tree
    #[command(visible_aliases = ["s", "sl", "l", "links"])]
    Symlinks(SymlinksOpts),
    /// List registered handlers, their rules, and whether they are installed
    Handlers,
    /// Print shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print version information
    Version,
}

/// Options for the `symlinks` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SymlinksOpts {
    #[command(subcommand)]
    pub action: SymlinkCommand,
}

/// `symlinks` actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymlinkCommand {
    /// Create links under $HOME
    #[command(visible_alias = "c")]
    Create,
    /// Remove links under $HOME
    #[command(visible_alias = "r")]
    Remove,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn log_name(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Symlinks(_) => "symlinks",
            Self::Handlers => "handlers",
            Self::Completions { .. } => "completions",
            Self::Version => "version",
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_format_and_aliases() {
        for name in ["format", "f", "fmt"] {
            let cli = Cli::parse_from(["cfgctl", name]);
            assert!(matches!(cli.command, Command::Format), "{name}");
        }
    }

    #[test]
    fn parse_symlinks_actions_and_aliases() {
        for (cmd, action, expected) in [
            ("symlinks", "create", SymlinkCommand::Create),
            ("s", "c", SymlinkCommand::Create),
            ("sl", "remove", SymlinkCommand::Remove),
            ("l", "r", SymlinkCommand::Remove),
            ("links", "create", SymlinkCommand::Create),
        ] {
            let cli = Cli::parse_from(["cfgctl", cmd, action]);
            assert!(
                matches!(cli.command, Command::Symlinks(SymlinksOpts { action }) if action == expected),
                "{cmd} {action}"
            );
        }
    }

    #[test]
    fn symlinks_requires_action() {
        assert!(Cli::try_parse_from(["cfgctl", "symlinks"]).is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["cfgctl", "deploy"]).is_err());
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["cfgctl", "-d", "format"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_root_override() {
        let cli = Cli::parse_from(["cfgctl", "--root", "/tmp/repo", "format"]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/tmp/repo")));
    }

    #[test]
    fn parallel_is_enabled_by_default() {
        let cli = Cli::parse_from(["cfgctl", "format"]);
        assert!(cli.global.parallel);
        assert!(!cli.global.fail_fast);
    }

    #[test]
    fn parallel_options_follow_flags() {
        let cli = Cli::parse_from([
            "cfgctl",
            "--no-parallel",
            "--jobs",
            "3",
            "--fail-fast",
            "--timeout",
            "30",
            "format",
        ]);
        let opts = cli.global.parallel_opts(Arc::new(AtomicBool::new(false)));
        assert!(!opts.parallel);
        assert_eq!(opts.threads, 3);
        assert!(opts.fail_fast);
        assert_eq!(cli.global.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(Cli::try_parse_from(["cfgctl", "--jobs", "0", "format"]).is_err());
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["cfgctl", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Command::Completions { shell: Shell::Bash }
        ));
    }

    #[test]
    fn parse_verbose_and_version() {
        let cli = Cli::parse_from(["cfgctl", "-v", "version"]);
        assert!(cli.verbose);
        assert_eq!(cli.command.log_name(), "version");
    }
}
