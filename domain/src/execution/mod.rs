//! Per-call execution domain: lifecycle states, failure taxonomy and
//! duplicate fingerprints.

pub mod fingerprint;
pub mod outcome;
pub mod state;

pub use fingerprint::CallFingerprint;
pub use outcome::{CallFailure, FailureKind, ToolCallOutcome};
pub use state::{StateTransition, ToolCallState, ToolExecution, is_valid_path};
