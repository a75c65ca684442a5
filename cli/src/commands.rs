//! CLI command definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// How confirmation requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfirmMode {
    /// Ask on the terminal
    Prompt,
    /// Approve every request
    Approve,
    /// Deny every request
    Deny,
}

impl ConfirmMode {
    /// Parse the `[approval] confirm` config value
    pub fn from_config(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value, true).ok()
    }
}

/// CLI arguments for relay
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about = "Streaming turn and tool-execution engine")]
#[command(long_about = r#"
relay runs model turns that call tools, gating each call through an
approval policy and a resource quota.

Configuration files are loaded from (in priority order):
1. RELAY_* environment variables (RELAY_TURN__MAX_DEPTH=4)
2. --config <path>     Explicit config file
3. ./relay.toml        Project-level config
4. ~/.config/tool-relay/config.toml   Global config

Example:
  relay turn --script demos/dns_turn.json "Does example.org resolve?"
  relay task echo --args '{"message": "hi"}'
  relay tools --schema
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Approval mode override (default, auto-edit, unrestricted, plan-only)
    #[arg(long, value_name = "MODE", global = true)]
    pub approval_mode: Option<String>,

    /// How confirmation requests are answered (overrides config)
    #[arg(long, value_enum, global = true)]
    pub confirm: Option<ConfirmMode>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Append transcript events (JSONL) to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub conversation_log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one model turn from a scripted fragment file
    Turn(TurnArgs),
    /// Run a goal-directed task against a single tool
    Task(TaskArgs),
    /// List registered tools
    Tools(ToolsArgs),
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct TurnArgs {
    /// User message that opens the conversation
    pub prompt: String,

    /// JSON script of model segments to replay
    #[arg(short, long, value_name = "PATH")]
    pub script: PathBuf,

    /// Pause between streamed fragments, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub fragment_delay_ms: u64,

    /// Print the full conversation history as JSON when done
    #[arg(long)]
    pub transcript: bool,
}

#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Tool to call
    pub tool: String,

    /// Initial arguments as a JSON object
    #[arg(short, long, value_name = "JSON", default_value = "{}")]
    pub args: String,

    /// Maximum attempts (defaults to [adaptive] bound)
    #[arg(short, long)]
    pub bound: Option<u32>,

    /// Argument overrides tried after each retry, in order (JSON object)
    #[arg(long = "candidate", value_name = "JSON")]
    pub candidates: Vec<String>,

    /// Tool error codes worth retrying (all codes when omitted)
    #[arg(long = "retry-code", value_name = "CODE")]
    pub retry_codes: Vec<String>,

    /// Payload field a successful result must carry
    #[arg(long = "require-field", value_name = "FIELD")]
    pub required_fields: Vec<String>,

    /// Escalate after this many consecutive retries
    #[arg(long, value_name = "N")]
    pub escalate_after: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Print the JSON Schema offered to the model instead of a table
    #[arg(long)]
    pub schema: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show configuration file locations
    Sources,
    /// Validate the merged configuration
    Validate,
    /// Print the merged configuration as TOML
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_task() {
        let cli = Cli::parse_from([
            "relay",
            "-vv",
            "task",
            "dns_lookup",
            "--args",
            r#"{"domain":"example.org"}"#,
            "--candidate",
            r#"{"domain":"www.example.org"}"#,
            "--retry-code",
            "NXDOMAIN",
            "--confirm",
            "deny",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.confirm, Some(ConfirmMode::Deny));
        let Command::Task(task) = cli.command else {
            panic!("expected task");
        };
        assert_eq!(task.tool, "dns_lookup");
        assert_eq!(task.candidates.len(), 1);
        assert_eq!(task.retry_codes, vec!["NXDOMAIN".to_string()]);
        assert_eq!(task.bound, None);
    }

    #[test]
    fn test_confirm_mode_from_config() {
        assert_eq!(ConfirmMode::from_config("approve"), Some(ConfirmMode::Approve));
        assert_eq!(ConfirmMode::from_config("PROMPT"), Some(ConfirmMode::Prompt));
        assert_eq!(ConfirmMode::from_config("maybe"), None);
    }
}
