//! Dependency wiring for one CLI session.

use anyhow::{Context, Result};
use relay_application::{
    AutoApproveConfirmation, AutoDenyConfirmation, ConfirmationPort, ConversationLogger,
    ExecutionProgressNotifier, NoExecutionProgress, ResourceManager, SessionConfig,
    ToolExecutionScheduler, ToolProvider, ToolRegistry, discover_into,
};
use relay_domain::ApprovalMode;
use relay_infrastructure::{
    CommandToolProvider, FileConfig, JsonlConversationLogger, builtin_provider,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::commands::{Cli, ConfirmMode};
use crate::console::{ConsoleProgress, StdinConfirmation};

pub struct Session {
    pub config: SessionConfig,
    pub registry: Arc<ToolRegistry>,
    pub scheduler: ToolExecutionScheduler,
    pub conversation_logger: Option<Arc<JsonlConversationLogger>>,
    pub confirm: ConfirmMode,
}

impl Session {
    pub async fn build(cli: &Cli, file: &FileConfig) -> Result<Self> {
        for issue in file.validate() {
            warn!(code = ?issue.code, "{}", issue.message);
        }

        let mut config = file.to_session_config();
        if let Some(mode) = &cli.approval_mode {
            let mode: ApprovalMode = mode.parse().context("Invalid --approval-mode")?;
            config = config.with_approval_mode(mode);
        }

        let confirm = cli.confirm.unwrap_or_else(|| {
            ConfirmMode::from_config(&file.approval.confirm).unwrap_or_else(|| {
                warn!(value = %file.approval.confirm, "Unknown approval.confirm, prompting");
                ConfirmMode::Prompt
            })
        });
        let confirmation: Arc<dyn ConfirmationPort> = match confirm {
            ConfirmMode::Prompt => Arc::new(StdinConfirmation::default()),
            ConfirmMode::Approve => Arc::new(AutoApproveConfirmation),
            ConfirmMode::Deny => Arc::new(AutoDenyConfirmation),
        };
        let progress: Arc<dyn ExecutionProgressNotifier> = if cli.quiet {
            Arc::new(NoExecutionProgress)
        } else {
            Arc::new(ConsoleProgress)
        };

        let registry = Arc::new(ToolRegistry::new());
        let mut providers: Vec<Arc<dyn ToolProvider>> = Vec::new();
        if file.tools.builtin {
            providers.push(Arc::new(builtin_provider()));
        }
        providers.push(Arc::new(CommandToolProvider::from_config(&file.tools.command)));
        let report = discover_into(&registry, &providers).await;
        info!(
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            "Tool discovery finished"
        );
        if !report.failed_sources.is_empty() {
            debug!(sources = ?report.failed_sources, "Some tool sources contributed nothing");
        }

        let resources = Arc::new(ResourceManager::new(&config.quotas));
        let scheduler =
            ToolExecutionScheduler::new(registry.clone(), resources, confirmation, &config)
                .with_progress(progress);

        let log_path = cli
            .conversation_log
            .clone()
            .or_else(|| file.logging.conversation_log.clone());
        let conversation_logger = match log_path {
            Some(path) => Some(Arc::new(
                JsonlConversationLogger::open(&path)
                    .with_context(|| format!("Cannot open conversation log {}", path.display()))?,
            )),
            None => None,
        };

        Ok(Self {
            config,
            registry,
            scheduler,
            conversation_logger,
            confirm,
        })
    }

    pub fn logger(&self) -> Option<Arc<dyn ConversationLogger>> {
        self.conversation_logger
            .clone()
            .map(|l| l as Arc<dyn ConversationLogger>)
    }
}
