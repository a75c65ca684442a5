//! Approval policy domain.
//!
//! | Mode | Read | Edit | Execute |
//! |------|------|------|---------|
//! | `Default` | approve / confirm if high-risk | same | same |
//! | `PlanOnly` | approve | deny | deny |
//! | `AutoEdit` | `Default` rules | approve | `Default` rules |
//! | `Unrestricted` | approve | approve | approve |

pub mod mode;
pub mod policy;

pub use mode::ApprovalMode;
pub use policy::ApprovalDecision;
