//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "tidewater", version, about = "On-host export agent")]
pub struct Cli {
    /// Agent root directory (defaults to `$HOME/.tidewater`)
    #[arg(long, global = true, env = "TIDEWATER_ROOT")]
    pub root: Option<PathBuf>,

    /// Log level or filter directive; `RUST_LOG` takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "TIDEWATER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Answer enrollment and job traffic with the in-process stand-in
    /// backend, for development without a broker
    #[arg(long, global = true, env = "TIDEWATER_LOCAL_BACKEND")]
    pub local_backend: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enroll this device with a one-time code
    Enroll(EnrollArgs),
    /// Run the agent until interrupted
    Run,
    /// Worker process entry point, launched by the agent for each job
    #[command(hide = true)]
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EnrollArgs {
    /// Enrollment code issued by the backend
    #[arg(long, env = "TIDEWATER_ENROLL_CODE")]
    pub code: String,

    /// Release channel the device is bound to
    #[arg(long, default_value = "stable")]
    pub channel: String,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long)]
    pub integrations_file: PathBuf,

    #[arg(long)]
    pub agent_config_file: PathBuf,

    #[arg(long)]
    pub job_id: String,

    #[arg(long)]
    pub reprocess_historical: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_worker_invocation() {
        let cli = Cli::try_parse_from([
            "tidewater",
            "export",
            "--integrations-file",
            "/tmp/a.json",
            "--agent-config-file",
            "/tmp/b.json",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--job-id",
            "j1",
            "--reprocess-historical",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.integrations_file, PathBuf::from("/tmp/a.json"));
                assert_eq!(args.agent_config_file, PathBuf::from("/tmp/b.json"));
                assert_eq!(args.job_id, "j1");
                assert!(args.reprocess_historical);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn enroll_requires_code() {
        let argv = ["tidewater", "enroll", "--code", "ABC", "--root", "/tmp/tw"];
        let cli = Cli::try_parse_from(argv).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/tw")));
        assert!(!cli.local_backend);
        match cli.command {
            Command::Enroll(args) => {
                assert_eq!(args.code, "ABC");
                assert_eq!(args.channel, "stable");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn json_log_format() {
        let cli = Cli::try_parse_from(["tidewater", "--log-format", "json", "run"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn local_backend_is_opt_in() {
        let cli = Cli::try_parse_from(["tidewater", "run", "--local-backend"]).unwrap();
        assert!(cli.local_backend);
    }
}
