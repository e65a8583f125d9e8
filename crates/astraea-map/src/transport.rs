//! LLM transport for schema-constrained mapping proposals.
//!
//! The engine depends only on the [`ProposalTransport`] trait; the real
//! implementation talks to the Anthropic Messages API with a forced tool
//! choice whose input schema is derived from [`DomainMappingProposal`], so
//! the model's output is schema-valid by construction. Tests inject
//! [`ScriptedTransport`] instead; the review and engine logic never needs
//! the network.

use std::cell::RefCell;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use astraea_model::DomainMappingProposal;

use crate::error::TransportError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const PROPOSAL_TOOL_NAME: &str = "submit_domain_mapping";

/// One proposal request.
#[derive(Debug, Clone)]
pub struct ProposalRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ProposalRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.1,
            max_tokens: 8192,
        }
    }
}

/// Capability the mapping engine consumes.
pub trait ProposalTransport {
    /// Run one schema-constrained proposal call.
    fn propose(&self, request: &ProposalRequest) -> Result<DomainMappingProposal, TransportError>;

    /// Model identifier recorded in the mapping spec.
    fn model_name(&self) -> &str;
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl TransportConfig {
    /// Build from an explicit key; fails when the key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TransportError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TransportError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
        })
    }

    /// Build from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, TransportError> {
        let key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        Self::new(key)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Anthropic Messages API transport.
pub struct AnthropicTransport {
    config: TransportConfig,
    http: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<Message<'a>>,
    tools: Vec<ToolDefinition<'a>>,
    tool_choice: ToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

impl AnthropicTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn call(&self, request: &ProposalRequest, repair_note: Option<&str>) -> Result<Value, TransportError> {
        let schema = schemars::schema_for!(DomainMappingProposal);
        let schema_value =
            serde_json::to_value(&schema).map_err(|e| TransportError::Schema(e.to_string()))?;

        let prompt_with_repair;
        let prompt = match repair_note {
            Some(note) => {
                prompt_with_repair = format!("{}\n\n{note}", request.prompt);
                prompt_with_repair.as_str()
            }
            None => request.prompt.as_str(),
        };

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            tools: vec![ToolDefinition {
                name: PROPOSAL_TOOL_NAME,
                description: "Submit the complete domain mapping proposal.",
                input_schema: schema_value,
            }],
            tool_choice: ToolChoice {
                kind: "tool",
                name: PROPOSAL_TOOL_NAME,
            },
        };

        let url = format!("{}/v1/messages", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !status.is_success() {
            if let Ok(parsed) = serde_json::from_str::<ApiError>(&text) {
                return Err(TransportError::Api {
                    kind: parsed.error.kind,
                    message: parsed.error.message,
                });
            }
            return Err(TransportError::Api {
                kind: status.to_string(),
                message: text,
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| TransportError::Schema(e.to_string()))?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "tool_use")
            .and_then(|block| block.input)
            .ok_or_else(|| TransportError::Schema("no tool_use block in response".to_string()))
    }
}

impl ProposalTransport for AnthropicTransport {
    fn propose(&self, request: &ProposalRequest) -> Result<DomainMappingProposal, TransportError> {
        let input = self.call(request, None)?;
        match serde_json::from_value::<DomainMappingProposal>(input) {
            Ok(proposal) => {
                debug!(
                    mappings = proposal.variable_mappings.len(),
                    "proposal received"
                );
                Ok(proposal)
            }
            Err(first_error) => {
                // The forced tool schema makes this rare; one bounded repair
                // attempt, then surface the failure.
                warn!(error = %first_error, "proposal failed to decode; retrying once");
                let note = format!(
                    "Your previous tool call did not satisfy the schema ({first_error}). \
                     Submit the proposal again, exactly matching the tool input schema."
                );
                let input = self.call(request, Some(&note))?;
                serde_json::from_value(input)
                    .map_err(|e| TransportError::Schema(e.to_string()))
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Test transport replaying canned proposals in order.
pub struct ScriptedTransport {
    responses: RefCell<Vec<Result<DomainMappingProposal, TransportError>>>,
    model: String,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<DomainMappingProposal, TransportError>>) -> Self {
        Self {
            responses: RefCell::new(responses),
            model: "scripted".to_string(),
        }
    }

    pub fn single(proposal: DomainMappingProposal) -> Self {
        Self::new(vec![Ok(proposal)])
    }
}

impl ProposalTransport for ScriptedTransport {
    fn propose(&self, _request: &ProposalRequest) -> Result<DomainMappingProposal, TransportError> {
        let mut responses = self.responses.borrow_mut();
        if responses.is_empty() {
            return Err(TransportError::Http("scripted transport exhausted".to_string()));
        }
        responses.remove(0)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
