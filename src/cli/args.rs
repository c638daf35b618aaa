use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser};

use crate::config::{ClonekitConfig, StatusStyle};

/// Clone Git repositories into fresh directories with live progress.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Configuration file, defaults to ~/.clonekit/config.toml
    #[clap(short, long, env = "CLONEKIT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub enum Command {
    ///Clones a repository into a new uniquely named directory
    Clone(CloneArgs),
}

#[derive(Debug, Args)]
pub struct CloneArgs {
    /// Repository to clone, defaults to the configured url
    pub url: Option<String>,
    /// Directory the clone directory is created in, defaults to the system temp directory
    #[clap(short, long)]
    pub directory: Option<PathBuf>,
    /// Also clone all submodules, recursively
    #[clap(short, long, overrides_with = "no_recurse_submodules")]
    pub recurse_submodules: bool,
    /// Do not clone submodules, even if configured
    #[clap(long, overrides_with = "recurse_submodules")]
    pub no_recurse_submodules: bool,
    /// Give up after this many seconds
    #[clap(short, long)]
    pub timeout: Option<u64>,
    /// How progress is shown
    #[clap(long, value_enum)]
    pub status: Option<StatusStyle>,
}

impl CloneArgs {
    /// `config` with every flag given on the command line applied over it.
    pub fn apply(self, config: ClonekitConfig) -> ClonekitConfig {
        let submodules = match (self.recurse_submodules, self.no_recurse_submodules) {
            (true, _) => true,
            (_, true) => false,
            _ => config.submodules,
        };
        ClonekitConfig {
            url: self.url.unwrap_or(config.url),
            directory: self.directory.or(config.directory),
            submodules,
            timeout: self.timeout.map(Duration::from_secs).or(config.timeout),
            status: self.status.unwrap_or(config.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    fn clone_args(args: &[&str]) -> CloneArgs {
        let cli = CliArgs::try_parse_from(["clonekit", "clone"].iter().chain(args)).unwrap();
        match cli.cmd {
            Command::Clone(args) => args,
        }
    }

    fn configured() -> ClonekitConfig {
        ClonekitConfig {
            url: "https://example.com/configured.git".to_owned(),
            directory: Some(PathBuf::from("/configured")),
            submodules: true,
            timeout: Some(Duration::from_secs(60)),
            status: StatusStyle::Terminal,
        }
    }

    #[test]
    fn verify_cli() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn flags_override_the_configuration() {
        let config = clone_args(&[
            "https://example.com/repo.git",
            "-d",
            "/clones",
            "--no-recurse-submodules",
            "--timeout",
            "30",
            "--status",
            "log",
        ])
        .apply(configured());

        assert_eq!(
            config,
            ClonekitConfig {
                url: "https://example.com/repo.git".to_owned(),
                directory: Some(PathBuf::from("/clones")),
                submodules: false,
                timeout: Some(Duration::from_secs(30)),
                status: StatusStyle::Log,
            }
        );
    }

    #[test]
    fn configuration_is_kept_without_flags() {
        assert_eq!(clone_args(&[]).apply(configured()), configured());
    }

    #[test]
    fn last_submodule_flag_wins() {
        let mut config = configured();
        config.submodules = false;
        assert!(clone_args(&["--no-recurse-submodules", "-r"])
            .apply(config)
            .submodules);
        assert!(!clone_args(&["-r", "--no-recurse-submodules"])
            .apply(configured())
            .submodules);
    }
}
