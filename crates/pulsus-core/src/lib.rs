//! Routing pipeline: intent parsing, scoring, policy selection,
//! composition, generation, and validation (spec §2 components
//! E, F, G, H, I, J, L).
//!
//! [`Router::route`] is the one public entry point (spec §6): it wires
//! the other crates in this workspace — `pulsus-registry` (discovery),
//! `pulsus-policy` (safety gating), `pulsus-sandbox` (dry-run
//! isolation), `pulsus-audit` (the event trail) — into the single
//! pipeline spec §4.L describes.

pub mod composer;
pub mod config;
pub mod generator;
pub mod intent;
pub mod outbound_guard;
pub mod retention;
pub mod router;
pub mod scorer;
pub mod selector;
pub mod validate;

pub use composer::{compose, ComposedModule};
pub use config::PulsusConfig;
pub use generator::{generate, CompletionClient, CompletionConstraints, GeneratedModule, GeneratorError};
pub use retention::sweep_scratch;
pub use router::{Router, RouteOptions};
pub use scorer::{score_candidates, InvocationHistory};
pub use selector::select_policy;

#[cfg(feature = "http-client")]
pub use generator::http::HttpCompletionClient;
