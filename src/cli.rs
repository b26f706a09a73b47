use std::path::PathBuf;

use clap::Parser;

/// Search Graylog for error logs in a date/time interval (Asia/Tehran).
#[derive(Parser, Debug)]
#[command(name = "issue-tracer", version, about)]
pub struct Cli {
    /// Start of interval (overrides .env). E.g. 2024-02-20 10:00. Asia/Tehran.
    #[arg(long = "from", value_name = "DATETIME")]
    pub from: Option<String>,

    /// End of interval (overrides .env). E.g. 2024-02-20 18:00. Asia/Tehran.
    #[arg(long = "to", value_name = "DATETIME")]
    pub to: Option<String>,

    /// Write JSON to a file (default: stdout).
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Omit the field allow-list from search requests (ask the backend
    /// for all message fields).
    #[arg(long)]
    pub no_fields: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_overrides_parse() {
        let cli = Cli::parse_from([
            "issue-tracer",
            "--from",
            "2024-02-20 10:00",
            "--to",
            "2024-02-20 18:00",
            "-o",
            "out.json",
            "--no-fields",
        ]);
        assert_eq!(cli.from.as_deref(), Some("2024-02-20 10:00"));
        assert_eq!(cli.to.as_deref(), Some("2024-02-20 18:00"));
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert!(cli.no_fields);
    }

    #[test]
    fn defaults_are_env_driven() {
        let cli = Cli::parse_from(["issue-tracer"]);
        assert!(cli.from.is_none());
        assert!(cli.to.is_none());
        assert!(cli.output.is_none());
        assert!(!cli.no_fields);
    }
}
