//! Approval decisions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::mode::ApprovalMode;
use crate::tool::entities::{ToolCategory, ToolDefinition};

/// Outcome of consulting the approval policy for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum ApprovalDecision {
    Approve,
    Deny(String),
    /// Suspend until an out-of-band signal arrives or the confirmation
    /// timeout elapses (which resolves to `Deny`)
    RequireConfirmation,
}

impl ApprovalDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalDecision::Approve)
    }
}

impl ApprovalMode {
    /// Decide whether a call to `tool` may proceed under this mode.
    ///
    /// Arguments are accepted so call metadata can be considered; the
    /// current rules depend on the tool's tags only.
    pub fn decide(&self, tool: &ToolDefinition, _arguments: &HashMap<String, Value>) -> ApprovalDecision {
        match self {
            ApprovalMode::Unrestricted => ApprovalDecision::Approve,
            ApprovalMode::PlanOnly if tool.is_mutating() => ApprovalDecision::Deny(format!(
                "'{}' is a {} tool and the session is plan-only",
                tool.name, tool.category
            )),
            ApprovalMode::PlanOnly => ApprovalDecision::Approve,
            ApprovalMode::AutoEdit if tool.category == ToolCategory::Edit => {
                ApprovalDecision::Approve
            }
            ApprovalMode::AutoEdit | ApprovalMode::Default => {
                if tool.is_high_risk() {
                    ApprovalDecision::RequireConfirmation
                } else {
                    ApprovalDecision::Approve
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::RiskLevel;

    fn tool(risk: RiskLevel, category: ToolCategory) -> ToolDefinition {
        ToolDefinition::new("t", "test", risk).with_category(category)
    }

    fn decide(mode: ApprovalMode, risk: RiskLevel, category: ToolCategory) -> ApprovalDecision {
        mode.decide(&tool(risk, category), &HashMap::new())
    }

    #[test]
    fn test_unrestricted_always_approves() {
        for risk in [RiskLevel::Low, RiskLevel::High] {
            for category in [ToolCategory::Read, ToolCategory::Edit, ToolCategory::Execute] {
                assert!(decide(ApprovalMode::Unrestricted, risk, category).is_approved());
            }
        }
    }

    #[test]
    fn test_plan_only_denies_mutating() {
        assert!(decide(ApprovalMode::PlanOnly, RiskLevel::High, ToolCategory::Read).is_approved());
        assert!(matches!(
            decide(ApprovalMode::PlanOnly, RiskLevel::Low, ToolCategory::Edit),
            ApprovalDecision::Deny(_)
        ));
        assert!(matches!(
            decide(ApprovalMode::PlanOnly, RiskLevel::High, ToolCategory::Execute),
            ApprovalDecision::Deny(_)
        ));
    }

    #[test]
    fn test_default_confirms_high_risk() {
        assert_eq!(
            decide(ApprovalMode::Default, RiskLevel::High, ToolCategory::Read),
            ApprovalDecision::RequireConfirmation
        );
        assert!(decide(ApprovalMode::Default, RiskLevel::Low, ToolCategory::Execute).is_approved());
    }

    #[test]
    fn test_auto_edit_approves_edit_class_only() {
        assert!(decide(ApprovalMode::AutoEdit, RiskLevel::High, ToolCategory::Edit).is_approved());
        assert_eq!(
            decide(ApprovalMode::AutoEdit, RiskLevel::High, ToolCategory::Execute),
            ApprovalDecision::RequireConfirmation
        );
        assert!(decide(ApprovalMode::AutoEdit, RiskLevel::Low, ToolCategory::Read).is_approved());
    }
}
