//! Terminal adapters: progress output, confirmation and escalation prompts.

use async_trait::async_trait;
use colored::Colorize;
use relay_application::{
    ConfirmationError, ConfirmationPort, ConfirmationRequest, EscalationDecision, EscalationPort,
    ExecutionProgressNotifier,
};
use relay_domain::{RetryContext, ToolCallOutcome, ToolCallState, Verdict, core::string::truncate};
use std::io::Write;
use tokio::sync::Mutex;

/// Prints streamed text to stdout and call progress to stderr.
pub struct ConsoleProgress;

impl ExecutionProgressNotifier for ConsoleProgress {
    fn on_model_invocation(&self, turn_id: &str, depth: usize) {
        if depth > 1 {
            eprintln!("{}", format!("[{turn_id}] model invocation {depth}").dimmed());
        }
    }

    fn on_content_delta(&self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn on_state_change(&self, call_id: &str, tool_name: &str, state: ToolCallState) {
        if state == ToolCallState::Executing {
            eprintln!("{} {} {}", "->".cyan(), tool_name.bold(), call_id.dimmed());
        }
    }

    fn on_tool_result(&self, outcome: &ToolCallOutcome) {
        match &outcome.result {
            Ok(payload) => eprintln!(
                "{} {} ({}ms) {}",
                "v".green(),
                outcome.tool_name.bold(),
                outcome.duration_ms,
                truncate(&payload.to_string(), 100).dimmed()
            ),
            Err(failure) => eprintln!(
                "{} {} [{}] {}",
                "x".red(),
                outcome.tool_name.bold(),
                outcome.state,
                failure
            ),
        }
    }

    fn on_confirmation_pending(&self, call_id: &str, tool_name: &str) {
        eprintln!("{} {} {}", "?".yellow(), tool_name.bold(), call_id.dimmed());
    }

    fn on_attempt(&self, tool_name: &str, attempt: u32, bound: u32) {
        eprintln!("{}", format!("attempt {attempt}/{bound}: {tool_name}").bold());
    }

    fn on_verdict(&self, attempt: u32, verdict: &Verdict) {
        let label = match verdict {
            Verdict::Success => verdict.as_str().green(),
            Verdict::Retry(_) => verdict.as_str().yellow(),
            Verdict::Fail(_) => verdict.as_str().red(),
        };
        match verdict.reason() {
            Some(reason) => eprintln!("  attempt {attempt}: {label} ({reason})"),
            None => eprintln!("  attempt {attempt}: {label}"),
        }
    }
}

/// Read one line from stdin without blocking the runtime.
async fn read_answer(prompt: String) -> Result<String, ConfirmationError> {
    tokio::task::spawn_blocking(move || {
        eprint!("{prompt}");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map(|_| line.trim().to_lowercase())
    })
    .await
    .map_err(|e| ConfirmationError::IoError(e.to_string()))?
    .map_err(|e| ConfirmationError::IoError(e.to_string()))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer, "y" | "yes")
}

/// Asks on the terminal, one request at a time.
///
/// A request that times out in the gate leaves its read pending; the next
/// line typed answers that stale read and is discarded.
#[derive(Default)]
pub struct StdinConfirmation {
    lock: Mutex<()>,
}

impl StdinConfirmation {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ConfirmationPort for StdinConfirmation {
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<bool, ConfirmationError> {
        let _turn = self.lock.lock().await;
        let args = serde_json::to_string(&request.arguments).unwrap_or_default();
        let prompt = format!(
            "{} {} [{} / {}] {}\n  approve? [y/N] ",
            "confirm".yellow().bold(),
            request.tool_name.bold(),
            request.risk_level,
            request.category,
            truncate(&args, 200)
        );
        Ok(is_yes(&read_answer(prompt).await?))
    }
}

/// Asks whether to keep retrying once the retry streak hits the threshold.
pub struct StdinEscalation;

#[async_trait]
impl EscalationPort for StdinEscalation {
    async fn escalate(&self, context: &RetryContext) -> EscalationDecision {
        let prompt = format!(
            "{} {} retried {} times in a row ({}/{} attempts)\n  keep going? [y/N] ",
            "escalation".magenta().bold(),
            context.tool_name.bold(),
            context.consecutive_retries(),
            context.attempts(),
            context.bound()
        );
        match read_answer(prompt).await {
            Ok(answer) if is_yes(&answer) => EscalationDecision::Continue,
            Ok(_) => EscalationDecision::Abort("stopped at escalation prompt".to_string()),
            Err(e) => EscalationDecision::Abort(format!("escalation prompt failed: {e}")),
        }
    }
}
