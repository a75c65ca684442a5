//! Session-scoped approval mode.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::error::DomainError;

/// Which tool calls may proceed without an out-of-band confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// High-risk calls need confirmation; everything else is approved
    #[default]
    Default,
    /// Mutating calls are denied outright
    PlanOnly,
    /// Edit-class calls are approved; everything else follows `Default`
    AutoEdit,
    /// Every call is approved
    Unrestricted,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalMode::Default => "default",
            ApprovalMode::PlanOnly => "plan_only",
            ApprovalMode::AutoEdit => "auto_edit",
            ApprovalMode::Unrestricted => "unrestricted",
        }
    }

    pub fn all() -> &'static [ApprovalMode] {
        &[
            ApprovalMode::Default,
            ApprovalMode::PlanOnly,
            ApprovalMode::AutoEdit,
            ApprovalMode::Unrestricted,
        ]
    }
}

impl std::fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ApprovalMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "default" => Ok(ApprovalMode::Default),
            "plan_only" | "plan" => Ok(ApprovalMode::PlanOnly),
            "auto_edit" => Ok(ApprovalMode::AutoEdit),
            "unrestricted" | "yolo" => Ok(ApprovalMode::Unrestricted),
            _ => Err(DomainError::UnknownApprovalMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_aliases() {
        assert_eq!("default".parse::<ApprovalMode>().unwrap(), ApprovalMode::Default);
        assert_eq!("plan".parse::<ApprovalMode>().unwrap(), ApprovalMode::PlanOnly);
        assert_eq!("Plan-Only".parse::<ApprovalMode>().unwrap(), ApprovalMode::PlanOnly);
        assert_eq!("auto-edit".parse::<ApprovalMode>().unwrap(), ApprovalMode::AutoEdit);
        assert_eq!("yolo".parse::<ApprovalMode>().unwrap(), ApprovalMode::Unrestricted);
        assert!(matches!(
            "sometimes".parse::<ApprovalMode>(),
            Err(DomainError::UnknownApprovalMode(_))
        ));
    }

    #[test]
    fn test_display_roundtrips_through_from_str() {
        for mode in ApprovalMode::all() {
            assert_eq!(mode.to_string().parse::<ApprovalMode>().unwrap(), *mode);
        }
    }
}
