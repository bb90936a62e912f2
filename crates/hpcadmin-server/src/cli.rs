//! Command-line interface.

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Administrative API for HPC user accounts and pirgs.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "hpcadmin-server", version, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    /// [default: /etc/hpcadmin-server/config.toml]
    #[arg(short, long, env = "HPCADMIN_SERVER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write route documentation to PATH and exit instead of serving
    #[arg(long, value_name = "PATH")]
    pub docs: Option<PathBuf>,

    /// Log filter directive (e.g. "info", "hpcadmin_server=debug,info")
    #[arg(long, env = "HPCADMIN_SERVER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON (the environment accepts true/false, 1/0, yes/no)
    #[arg(
        long,
        env = "HPCADMIN_SERVER_LOG_JSON",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub log_json: bool,
}

impl Cli {
    /// Parses the process arguments, accepting the legacy `-docs` spelling.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_legacy_flags(std::env::args_os()))
    }

    /// Like [`Cli::parse_args`] but for an explicit argument list.
    pub fn try_parse_args_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_legacy_flags(args))
    }
}

/// Rewrites single-dash `-docs` into `--docs`.
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let replacement = match arg.to_str() {
                Some("-docs") => Some(OsString::from("--docs")),
                Some(s) if s.starts_with("-docs=") => Some(OsString::from(format!("-{s}"))),
                _ => None,
            };
            replacement.unwrap_or(arg)
        })
        .collect()
}
