//! Shared wire types for the Pulsus routing pipeline.
//!
//! Every capability invocation and every internal pipeline stage speaks
//! the same [`Envelope`] shape (spec §3 "Envelope"). The other modules
//! here describe the registry (capability descriptors, safety levels),
//! the intent parser's output, the scorer's output, and the router's
//! terminal [`RouteDecision`].

pub mod capability;
pub mod decision;
pub mod envelope;
pub mod error;
pub mod intent;
pub mod score;

pub use capability::{CapabilityDescriptor, ExecutionMode, Parameter, Provider, SafetyLevel};
pub use decision::{Policy, RouteDecision, StageResult, ValidationReport};
pub use envelope::{Envelope, Status};
pub use error::{ErrorKind, PulsusError};
pub use intent::ParsedIntent;
pub use score::{ScoreBreakdown, ScoredCandidate};
