//! Configuration issues.
//!
//! File configuration is parsed in the infrastructure layer; validation
//! reports problems as structured [`ConfigIssue`] values so callers can
//! decide whether to abort (any `Error`) or continue with defaults.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: a default is substituted.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// Approval mode string not recognized
    UnknownApprovalMode,
    /// A timeout configured as zero
    ZeroTimeout,
    /// A quota configured as zero (nothing could ever run)
    ZeroQuota,
    /// Max turn depth or adaptive bound configured as zero
    ZeroBound,
    /// Tool call policy string not recognized
    UnknownToolCallPolicy,
    /// Two command tools share a name
    DuplicateCommandTool,
    /// Risk level or category string not recognized
    UnknownToolTag,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}
