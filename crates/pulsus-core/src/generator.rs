//! Generator (spec §4.I, component I).
//!
//! Builds the system/user prompt, calls the abstract
//! [`CompletionClient`], validates the response shape, and retries up
//! to twice with an error-fix prompt before surfacing a `blocked`
//! envelope.

use async_trait::async_trait;

use pulsus_common::capability::CapabilityDescriptor;
use pulsus_common::intent::ParsedIntent;

const MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct CompletionConstraints {
    pub temperature: f64,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("completion client error: {0}")]
    Client(String),
    #[error("generated module failed shape validation after retries: {0}")]
    InvalidShape(String),
}

/// The one collaborator interface the Generator consumes (spec §6).
/// A default HTTP implementation is provided behind the `http-client`
/// feature; the interface itself is the contract.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        constraints: &CompletionConstraints,
    ) -> Result<String, GeneratorError>;
}

pub struct GeneratedModule {
    pub source: String,
    /// Number of completion calls actually made (1 unless a retry fired).
    pub attempts: u32,
}

/// Generate a single-`handle`-entry-point module for `utterance`
/// (spec §4.I). `nearby` are the top-K "see also" capabilities by
/// doc-score, included as context in the user prompt.
pub async fn generate(
    client: &dyn CompletionClient,
    utterance: &str,
    intent: &ParsedIntent,
    nearby: &[CapabilityDescriptor],
    constraints: &CompletionConstraints,
) -> Result<GeneratedModule, GeneratorError> {
    let system_prompt = system_prompt();
    let mut user_prompt = user_prompt(utterance, intent, nearby);
    let mut attempts = 0;
    let mut last_error = String::new();

    while attempts <= MAX_RETRIES {
        attempts += 1;
        let response = client
            .complete(&system_prompt, &user_prompt, constraints)
            .await?;
        match validate_shape(&response) {
            Ok(()) => {
                return Ok(GeneratedModule {
                    source: response,
                    attempts,
                })
            }
            Err(reason) => {
                last_error = reason.clone();
                user_prompt = error_fix_prompt(utterance, intent, nearby, &response, &reason);
            }
        }
    }

    Err(GeneratorError::InvalidShape(last_error))
}

fn system_prompt() -> String {
    "You generate exactly one Python module. It must define a module-level `domain` \
     string, a module-level `action` string, and exactly one top-level function \
     `handle(text) -> envelope`. Do not call exec/eval, do not open network sockets, \
     and do not read or write any path outside the run's scratch directory."
        .to_string()
}

fn user_prompt(utterance: &str, intent: &ParsedIntent, nearby: &[CapabilityDescriptor]) -> String {
    let see_also: Vec<String> = nearby
        .iter()
        .map(|d| format!("- ({}, {}): {}", d.domain, d.action, d.description))
        .collect();
    format!(
        "Utterance: {utterance:?}\n\
         Parsed intent: domain={domain:?} action={action:?} confidence={confidence}\n\
         See also:\n{see_also}\n\n\
         The returned envelope must be a JSON object with at least `success` and `data` keys.",
        domain = intent.domain,
        action = intent.action,
        confidence = intent.confidence,
        see_also = see_also.join("\n"),
    )
}

fn error_fix_prompt(
    utterance: &str,
    intent: &ParsedIntent,
    nearby: &[CapabilityDescriptor],
    previous_response: &str,
    reason: &str,
) -> String {
    format!(
        "{}\n\nYour previous response failed validation: {reason}\n\
         Previous response was:\n{previous_response}\n\n\
         Fix the issue and return only the corrected module.",
        user_prompt(utterance, intent, nearby)
    )
}

/// "(a) a well-formed module text and (b) contain exactly one
/// top-level `handle` definition" (spec §4.I).
fn validate_shape(source: &str) -> Result<(), String> {
    if source.trim().is_empty() {
        return Err("empty response".to_string());
    }
    let handle_defs = source
        .lines()
        .filter(|l| l.trim_start().starts_with("def handle("))
        .count();
    match handle_defs {
        0 => Err("no top-level `handle` definition found".to_string()),
        1 => Ok(()),
        n => Err(format!("expected exactly one `handle` definition, found {n}")),
    }
}

#[cfg(feature = "http-client")]
pub mod http {
    //! Default `CompletionClient`: a plain HTTP call to a locally
    //! running model endpoint, grounded on `providers::llm::openai::
    //! OpenAIClient` including its outbound-network policy check
    //! before every request (SPEC_FULL.md §4.I supplement).

    use super::{CompletionClient, CompletionConstraints, GeneratorError};
    use crate::outbound_guard::check_outbound;
    use async_trait::async_trait;
    use std::time::Duration;

    pub struct HttpCompletionClient {
        endpoint: String,
        model: String,
        client: reqwest::Client,
    }

    impl HttpCompletionClient {
        pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout_ms: u64) -> Self {
            Self {
                endpoint: endpoint.into(),
                model: model.into(),
                client: reqwest::Client::builder()
                    .timeout(Duration::from_millis(timeout_ms))
                    .build()
                    .expect("reqwest client builds"),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for HttpCompletionClient {
        async fn complete(
            &self,
            system: &str,
            user: &str,
            constraints: &CompletionConstraints,
        ) -> Result<String, GeneratorError> {
            check_outbound(&self.endpoint).map_err(GeneratorError::Client)?;

            let body = serde_json::json!({
                "model": self.model,
                "system": system,
                "prompt": user,
                "temperature": constraints.temperature,
                "max_tokens": constraints.max_tokens,
                "stop": constraints.stop,
            });

            let response = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| GeneratorError::Client(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(GeneratorError::Client(format!(
                    "completion endpoint returned {status}: {text}"
                )));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| GeneratorError::Client(e.to_string()))?;
            json.get("text")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| GeneratorError::Client("response missing `text` field".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedClient {
        responses: Vec<&'static str>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _constraints: &CompletionConstraints,
        ) -> Result<String, GeneratorError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self.responses[i.min(self.responses.len() - 1)].to_string())
        }
    }

    fn constraints() -> CompletionConstraints {
        CompletionConstraints {
            temperature: 0.2,
            max_tokens: 2048,
            stop: vec!["\n\n\n".to_string()],
        }
    }

    #[tokio::test]
    async fn a_well_formed_first_response_succeeds_without_retry() {
        let client = ScriptedClient {
            responses: vec!["domain = \"x\"\naction = \"y\"\ndef handle(text):\n    pass\n"],
            calls: AtomicU32::new(0),
        };
        let result = generate(&client, "do a thing", &ParsedIntent::empty(), &[], &constraints())
            .await
            .unwrap();
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn a_malformed_response_retries_then_succeeds() {
        let client = ScriptedClient {
            responses: vec![
                "not a module at all",
                "def handle(text):\n    pass\ndef handle(x):\n    pass\n",
                "def handle(text):\n    pass\n",
            ],
            calls: AtomicU32::new(0),
        };
        let result = generate(&client, "do a thing", &ParsedIntent::empty(), &[], &constraints())
            .await
            .unwrap();
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_invalid_shape() {
        let client = ScriptedClient {
            responses: vec!["still not a module"],
            calls: AtomicU32::new(0),
        };
        let result = generate(&client, "do a thing", &ParsedIntent::empty(), &[], &constraints()).await;
        assert!(matches!(result, Err(GeneratorError::InvalidShape(_))));
    }
}
