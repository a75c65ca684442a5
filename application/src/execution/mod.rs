//! Core engine services.
//!
//! Leaf-first: [`resource_manager`] and [`registry`] have no dependencies on
//! each other, [`approval_gate`] applies the session's approval mode, and
//! [`scheduler`] drives each call through all three.

pub mod approval_gate;
pub mod registry;
pub mod resource_manager;
pub mod scheduler;

pub use approval_gate::{ApprovalGate, GateVerdict};
pub use registry::{DiscoveryReport, Registration, RegistryError, RegistryStats, ToolRegistry, discover_into};
pub use resource_manager::{PendingReservation, Reservation, ResourceError, ResourceManager};
pub use scheduler::{CallHandle, ToolExecutionScheduler, TurnScope};
