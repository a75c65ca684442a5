//! Command tool provider: `[[tools.command]]` entries as tools.
//!
//! Each entry wraps a shell command template with `{param}` placeholders.
//! Argument values are shell-escaped before substitution (single-quote
//! wrapping on Unix, double quotes on Windows), so a value can never break
//! out of its word.
//!
//! ```toml
//! [[tools.command]]
//! name = "dns_lookup"
//! description = "Resolve a domain"
//! command = "dig +short {domain}"
//! risk_level = "low"
//! category = "read"
//!
//! [[tools.command.parameters]]
//! name = "domain"
//! description = "Domain to resolve"
//! required = true
//! ```
//!
//! Commands run under `sh -c` with `kill_on_drop`: when the call is
//! cancelled or the scheduler's deadline drops the future, the child is
//! killed.

use async_trait::async_trait;
use relay_application::{ProviderError, ToolDescriptor, ToolHandle, ToolProvider};
use relay_domain::core::string::truncate;
use relay_domain::{ToolCall, ToolDefinition, ToolError, ToolParameter};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FileCommandToolConfig;

/// Priority of command tools (below in-process functions, above remotes)
pub const COMMAND_PRIORITY: i32 = 75;

/// Maximum captured size per stream (1 MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// One command-backed tool
#[derive(Debug, Clone)]
pub struct CommandTool {
    definition: ToolDefinition,
    template: String,
    working_dir: Option<PathBuf>,
}

impl CommandTool {
    pub fn new(definition: ToolDefinition, template: impl Into<String>) -> Self {
        Self {
            definition,
            template: template.into(),
            working_dir: None,
        }
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// First word of the template: the executable looked up on PATH
    pub fn program(&self) -> Option<&str> {
        self.template.split_whitespace().next()
    }

    fn from_config(config: &FileCommandToolConfig) -> Self {
        let (risk_level, _) = config.parse_risk_level();
        let (category, _) = config.parse_category();

        let mut definition =
            ToolDefinition::new(config.name.as_str(), config.description.as_str(), risk_level)
                .with_category(category);
        for param in &config.parameters {
            definition = definition.with_parameter(
                ToolParameter::new(param.name.as_str(), param.description.as_str(), param.required)
                    .with_type(param.param_type.as_str()),
            );
        }
        if let Some(secs) = config.timeout_secs.filter(|s| *s > 0) {
            definition = definition.with_timeout(Duration::from_secs(secs));
        }
        Self::new(definition, config.command.as_str())
    }

    async fn run(&self, command_str: &str, cancel: &CancellationToken) -> Result<Value, ToolError> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command_str]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command_str]);
            c
        };
        if let Some(dir) = self.working_dir.as_ref().filter(|d| d.is_dir()) {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            ToolError::execution_failed(format!("Failed to spawn command: {e}"))
        })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| {
                ToolError::execution_failed(format!("Failed to collect command output: {e}"))
            })?,
            // Dropping the wait future kills the child
            _ = cancel.cancelled() => return Err(ToolError::cancelled(&self.definition.name)),
        };

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout), MAX_OUTPUT_SIZE);
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr), MAX_OUTPUT_SIZE);
        let exit_code = output.status.code();
        debug!(tool = %self.definition.name, ?exit_code, bytes = stdout.len(), "Command finished");

        if output.status.success() {
            Ok(json!({
                "exit_code": exit_code,
                "stdout": stdout,
                "stderr": stderr,
            }))
        } else {
            let message = if stderr.trim().is_empty() {
                format!("Command failed with exit code: {exit_code:?}")
            } else {
                stderr.trim().to_string()
            };
            Err(ToolError::execution_failed(message)
                .with_details(format!("exit_code={exit_code:?}")))
        }
    }
}

#[async_trait]
impl ToolHandle for CommandTool {
    async fn invoke(&self, call: &ToolCall, cancel: CancellationToken) -> Result<Value, ToolError> {
        let command_str = build_command(&self.template, call);
        debug!(tool = %call.tool_name, call_id = %call.id, command = %command_str, "Running command tool");
        self.run(&command_str, &cancel).await
    }
}

/// Provider for `[[tools.command]]` entries.
#[derive(Debug, Clone, Default)]
pub struct CommandToolProvider {
    tools: Vec<CommandTool>,
}

impl CommandToolProvider {
    pub fn from_config(configs: &[FileCommandToolConfig]) -> Self {
        Self {
            tools: configs.iter().map(CommandTool::from_config).collect(),
        }
    }

    /// Set the working directory for every command.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        for tool in &mut self.tools {
            tool.working_dir = Some(dir.clone());
        }
        self
    }

    pub fn tools(&self) -> &[CommandTool] {
        &self.tools
    }
}

#[async_trait]
impl ToolProvider for CommandToolProvider {
    fn id(&self) -> &str {
        "command"
    }

    fn display_name(&self) -> &str {
        "Command Tools"
    }

    fn priority(&self) -> i32 {
        COMMAND_PRIORITY
    }

    async fn is_available(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Tools whose program is not on PATH are left out.
    async fn discover(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        let mut descriptors = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            let Some(program) = tool.program() else {
                warn!(tool = %tool.definition.name, "Command tool has an empty command, skipping");
                continue;
            };
            if which::which(program).is_err() {
                warn!(tool = %tool.definition.name, %program, "Command not found on PATH, skipping");
                continue;
            }
            descriptors.push(ToolDescriptor::new(
                tool.definition.clone(),
                Arc::new(tool.clone()),
            ));
        }
        Ok(descriptors)
    }
}

/// Substitute `{param}` placeholders with shell-escaped argument values.
///
/// Placeholders without an argument (optional parameters) are removed.
/// Braces that do not form a `{identifier}` placeholder are kept verbatim.
fn build_command(template: &str, call: &ToolCall) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            // Unclosed brace, keep the remainder as-is
            result.push_str(&rest[open..]);
            return result;
        };
        let key = &after[..close];
        let is_placeholder =
            !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !is_placeholder {
            result.push('{');
            rest = after;
            continue;
        }
        if let Some(value) = call.arguments.get(key) {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            result.push_str(&shell_escape(&text));
        }
        rest = &after[close + 1..];
    }
    result.push_str(rest);
    result
}

/// Escape a string for safe shell substitution.
fn shell_escape(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
    {
        return s.to_string();
    }
    if cfg!(target_os = "windows") {
        shell_escape_windows(s)
    } else {
        shell_escape_unix(s)
    }
}

/// `it's` → `'it'\''s'`
fn shell_escape_unix(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Double quotes, with `"`, `%` and `!` escaped for cmd.exe
fn shell_escape_windows(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('"');
    for ch in s.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '%' => escaped.push_str("%%"),
            '!' => escaped.push_str("^!"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileCommandToolParameter;
    use relay_domain::{RiskLevel, ToolCategory};

    fn config(name: &str, command: &str, params: &[(&str, bool)]) -> FileCommandToolConfig {
        FileCommandToolConfig {
            name: name.to_string(),
            description: format!("{name} tool"),
            command: command.to_string(),
            risk_level: "low".to_string(),
            category: "read".to_string(),
            timeout_secs: None,
            parameters: params
                .iter()
                .map(|(p, required)| FileCommandToolParameter {
                    name: p.to_string(),
                    description: p.to_string(),
                    param_type: "string".to_string(),
                    required: *required,
                })
                .collect(),
        }
    }

    #[test]
    fn test_shell_escape_safe_string() {
        assert_eq!(shell_escape("example.org"), "example.org");
        assert_eq!(shell_escape("/var/log"), "/var/log");
        assert_eq!(shell_escape_unix(""), "''");
    }

    #[test]
    fn test_shell_escape_special_chars() {
        assert_eq!(shell_escape_unix("hello world"), "'hello world'");
        assert_eq!(shell_escape_unix("it's"), "'it'\\''s'");
        assert_eq!(shell_escape_unix("$(rm -rf /)"), "'$(rm -rf /)'");
        assert_eq!(shell_escape_unix("a; rm -rf /"), "'a; rm -rf /'");
    }

    #[test]
    fn test_shell_escape_windows() {
        assert_eq!(shell_escape_windows("hello world"), "\"hello world\"");
        assert_eq!(shell_escape_windows("100%"), "\"100%%\"");
        assert_eq!(shell_escape_windows("wow!"), "\"wow^!\"");
    }

    #[test]
    fn test_build_command_substitutes_and_removes() {
        let call = ToolCall::new("c1", "dig").with_arg("domain", "example.org");
        assert_eq!(
            build_command("dig +short {domain} {record}", &call),
            "dig +short example.org "
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_build_command_escapes_values() {
        let call = ToolCall::new("c1", "echo").with_arg("msg", "hi; rm -rf /");
        assert_eq!(build_command("echo {msg}", &call), "echo 'hi; rm -rf /'");
    }

    #[test]
    fn test_build_command_non_string_values() {
        let call = ToolCall::new("c1", "t").with_arg("count", 3);
        assert_eq!(build_command("ping -c {count} host", &call), "ping -c 3 host");
    }

    #[test]
    fn test_build_command_keeps_non_placeholders() {
        let call = ToolCall::new("c1", "t").with_arg("msg", "x");
        assert_eq!(build_command("awk '{print $1}' {msg}", &call), "awk '{print $1}' x");
        assert_eq!(build_command("echo {msg", &call), "echo {msg");
    }

    #[test]
    fn test_substituted_value_is_not_rescanned() {
        let call = ToolCall::new("c1", "t")
            .with_arg("a", "{b}")
            .with_arg("b", "oops");
        let cmd = build_command("echo {a}", &call);
        assert!(cmd.contains("{b}"), "{cmd}");
    }

    #[test]
    fn test_from_config_maps_tags_and_timeout() {
        let mut cfg = config("restart", "systemctl restart {unit}", &[("unit", true)]);
        cfg.risk_level = "high".into();
        cfg.category = "execute".into();
        cfg.timeout_secs = Some(5);

        let provider = CommandToolProvider::from_config(&[cfg]);
        let tool = &provider.tools()[0];
        assert_eq!(tool.definition().risk_level, RiskLevel::High);
        assert_eq!(tool.definition().category, ToolCategory::Execute);
        assert_eq!(tool.definition().timeout(), Some(Duration::from_secs(5)));
        assert!(tool.definition().parameter("unit").unwrap().required);
        assert_eq!(tool.program(), Some("systemctl"));
    }

    #[tokio::test]
    async fn test_discover_skips_missing_programs() {
        let provider = CommandToolProvider::from_config(&[
            config("say", "echo {msg}", &[("msg", true)]),
            config("ghost", "definitely-not-a-real-binary-xyz {msg}", &[("msg", true)]),
        ]);
        assert!(provider.is_available().await);
        assert_eq!(provider.priority(), COMMAND_PRIORITY);

        let names: Vec<String> = provider
            .discover()
            .await
            .unwrap()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["say".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_provider_is_unavailable() {
        assert!(!CommandToolProvider::default().is_available().await);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_invoke_echo() {
        let tool = CommandTool::from_config(&config("say", "echo {msg}", &[("msg", true)]));
        let call = ToolCall::new("c1", "say").with_arg("msg", "hello relay");
        let payload = tool.invoke(&call, CancellationToken::new()).await.unwrap();
        assert_eq!(payload["exit_code"], 0);
        assert_eq!(payload["stdout"], "hello relay\n");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_invoke_failure_carries_stderr() {
        let tool = CommandTool::from_config(&config("fail", "sh -c 'echo boom >&2; exit 3'", &[]));
        let err = tool
            .invoke(&ToolCall::new("c1", "fail"), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "EXECUTION_FAILED");
        assert_eq!(err.message, "boom");
        assert_eq!(err.details.as_deref(), Some("exit_code=Some(3)"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_invoke_cancelled_kills_command() {
        let tool = CommandTool::from_config(&config("wait", "sleep 30", &[]));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let started = std::time::Instant::now();
        let err = tool
            .invoke(&ToolCall::new("c1", "wait"), token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
