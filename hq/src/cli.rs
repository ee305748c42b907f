//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// hookqueue - offline-tolerant webhook message queue
#[derive(Parser)]
#[command(
    name = "hq",
    about = "Queue messages for a webhook and deliver them when the network allows",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Queue database to use instead of the configured one
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    /// Skip connectivity probing and treat the network as usable
    #[arg(long, global = true)]
    pub assume_online: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue a message and try to deliver it
    Add {
        /// Message text (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Return as soon as the message is queued
        #[arg(long)]
        no_wait: bool,

        /// Seconds to wait for delivery before giving up
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Remove a queued message (unique id prefix accepted)
    Cancel {
        /// Message id or prefix
        id: String,
    },

    /// List queued messages
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show queue status
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or set the webhook endpoint
    Endpoint {
        /// New endpoint URL
        url: Option<String>,

        /// Do not wait for queued messages to be delivered after setting
        #[arg(long)]
        no_wait: bool,
    },

    /// Drop every queued message
    Clear,

    /// Deliver in the foreground until interrupted
    Run {
        /// Exit once the queue is empty and nothing is sending
        #[arg(long)]
        exit_when_idle: bool,
    },
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hookqueue")
        .join("logs")
        .join("hookqueue.log")
}

/// Output format for list and status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["hq"]);
        assert!(cli.command.is_none());
        assert!(!cli.assume_online);
    }

    #[test]
    fn test_cli_parse_add_joins_words() {
        let cli = Cli::parse_from(["hq", "add", "hello", "there", "--no-wait"]);
        match cli.command {
            Some(Command::Add { text, no_wait, timeout }) => {
                assert_eq!(text.join(" "), "hello there");
                assert!(no_wait);
                assert_eq!(timeout, 30);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_add_requires_text() {
        assert!(Cli::try_parse_from(["hq", "add"]).is_err());
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["hq", "list", "--store", "/tmp/q.db", "--assume-online"]);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/q.db")));
        assert!(cli.assume_online);
        assert!(matches!(
            cli.command,
            Some(Command::List {
                format: OutputFormat::Text
            })
        ));
    }

    #[test]
    fn test_cli_parse_status_json() {
        let cli = Cli::parse_from(["hq", "status", "--format", "json"]);
        assert!(matches!(
            cli.command,
            Some(Command::Status {
                format: OutputFormat::Json
            })
        ));
    }

    #[test]
    fn test_cli_parse_endpoint_show_and_set() {
        let cli = Cli::parse_from(["hq", "endpoint"]);
        assert!(matches!(cli.command, Some(Command::Endpoint { url: None, .. })));

        let cli = Cli::parse_from(["hq", "endpoint", "https://example.com/hook"]);
        match cli.command {
            Some(Command::Endpoint { url, no_wait }) => {
                assert_eq!(url.as_deref(), Some("https://example.com/hook"));
                assert!(!no_wait);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["hq", "run", "--exit-when-idle"]);
        assert!(matches!(cli.command, Some(Command::Run { exit_when_idle: true })));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_log_path_location() {
        let path = get_log_path();
        assert!(path.ends_with("hookqueue/logs/hookqueue.log"));
    }
}
