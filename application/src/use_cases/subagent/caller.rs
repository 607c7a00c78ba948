//! Subagent Caller
//!
//! Invokes one role through the [`ModelGateway`], extracts and decodes its
//! JSON output, retries with a corrective instruction on parse failure and
//! serves idempotent roles from the [`SubagentCache`].

use super::cache::{SubagentCache, cache_key};
use crate::config::ModelRouting;
use crate::ports::cache_persistence::CachedSubagentArtifact;
use crate::ports::model_gateway::{CompletionOptions, GatewayError, ModelGateway};
use crate::use_cases::observability::{CallRecord, ObservabilityTracker};
use crate::use_cases::shared::{Cancelled, cancellable, check_cancelled};
use chrono::Utc;
use cohort_domain::core::string::truncate;
use cohort_domain::subagent::parsing::decode_output;
use cohort_domain::{
    Message, Model, ModelTier, RolePromptTemplate, SubagentOutput, SubagentRole,
    extract_json_object,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Raw output kept in a parse-exhaustion error.
const MAX_RAW_IN_ERROR: usize = 600;

#[derive(Error, Debug, Clone)]
pub enum SubagentError {
    #[error("{role} output could not be parsed after {attempts} attempts ({error}); last output: {raw}")]
    ParseExhausted {
        role: SubagentRole,
        attempts: usize,
        error: String,
        raw: String,
    },

    #[error("{role} model call failed: {source}")]
    Gateway {
        role: SubagentRole,
        source: GatewayError,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<Cancelled> for SubagentError {
    fn from(_: Cancelled) -> Self {
        SubagentError::Cancelled
    }
}

/// One role invocation.
#[derive(Debug, Clone, Copy)]
pub struct SubagentCall<'a> {
    pub role: SubagentRole,
    pub system: &'a str,
    pub prompt: &'a str,
    pub tier_override: Option<ModelTier>,
    /// Second opinion after a weak first answer
    pub escalation: bool,
}

impl<'a> SubagentCall<'a> {
    pub fn new(role: SubagentRole, system: &'a str, prompt: &'a str) -> Self {
        Self {
            role,
            system,
            prompt,
            tier_override: None,
            escalation: false,
        }
    }

    /// Force the heavy tier and count the call as an escalation.
    pub fn escalated(mut self) -> Self {
        self.tier_override = Some(ModelTier::Heavy);
        self.escalation = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SubagentResponse<T> {
    pub parsed: T,
    pub raw: String,
    /// Model calls made; zero on a cache hit
    pub attempts: usize,
    pub model_used: Model,
    pub tier: ModelTier,
    pub cache_hit: bool,
    pub latency_ms: u64,
}

pub struct SubagentCaller {
    gateway: Arc<dyn ModelGateway>,
    routing: ModelRouting,
    cache: Arc<SubagentCache>,
    observability: Arc<ObservabilityTracker>,
    max_attempts: usize,
    temperature: f32,
    max_tokens: u32,
    cancellation: CancellationToken,
}

impl SubagentCaller {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        routing: ModelRouting,
        cache: Arc<SubagentCache>,
        observability: Arc<ObservabilityTracker>,
    ) -> Self {
        Self {
            gateway,
            routing,
            cache,
            observability,
            max_attempts: 4,
            temperature: 0.2,
            max_tokens: 4096,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cache(&self) -> &Arc<SubagentCache> {
        &self.cache
    }

    pub async fn call<T: SubagentOutput>(
        &self,
        call: SubagentCall<'_>,
    ) -> Result<SubagentResponse<T>, SubagentError> {
        check_cancelled(&self.cancellation)?;

        let (model, tier) = self.routing.resolve(call.role, call.tier_override);
        let mut record = CallRecord::new(call.role, tier);
        record.escalated = call.escalation;

        let key = call
            .role
            .is_cacheable()
            .then(|| cache_key(call.role, &model, call.system, call.prompt));

        if let Some(key) = &key
            && let Some(hit) = self.cache.get(key)
        {
            match decode_output::<T>(hit.payload.clone()) {
                Ok(parsed) => {
                    debug!(role = %call.role, hits = hit.hits, "Subagent cache hit");
                    record.cache_hit = true;
                    self.observability.record_call(&record);
                    return Ok(SubagentResponse {
                        parsed,
                        raw: hit.raw,
                        attempts: 0,
                        model_used: model,
                        tier,
                        cache_hit: true,
                        latency_ms: 0,
                    });
                }
                Err(e) => warn!(role = %call.role, error = %e, "Ignoring stale cache entry"),
            }
        }

        let options = CompletionOptions::new(model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let start = Instant::now();
        let mut last_error = String::new();
        let mut last_raw = String::new();

        for attempt in 1..=self.max_attempts {
            check_cancelled(&self.cancellation)?;

            let prompt = if attempt == 1 {
                call.prompt.to_string()
            } else {
                format!(
                    "{}{}",
                    call.prompt,
                    RolePromptTemplate::corrective_suffix(&last_error)
                )
            };
            let messages = [Message::system(call.system), Message::user(prompt)];
            record.input_chars += messages.iter().map(Message::char_len).sum::<usize>();

            info!(role = %call.role, model = %model, attempt, "Calling subagent");
            let gateway = self.gateway.clone();
            let completion = cancellable(&self.cancellation, async {
                gateway
                    .complete(&messages, &options)
                    .await
                    .map_err(|source| SubagentError::Gateway {
                        role: call.role,
                        source,
                    })
            })
            .await;

            let completion = match completion {
                Ok(completion) => completion,
                Err(e) => {
                    record.failed = !matches!(e, SubagentError::Cancelled);
                    record.retries = attempt - 1;
                    record.latency_ms = start.elapsed().as_millis() as u64;
                    self.observability.record_call(&record);
                    return Err(e);
                }
            };
            record.output_chars += completion.content.chars().count();

            let parsed = extract_json_object(&completion.content).and_then(|value| {
                decode_output::<T>(value.clone()).map(|parsed| (parsed, value))
            });

            match parsed {
                Ok((parsed, payload)) => {
                    let latency_ms = start.elapsed().as_millis() as u64;
                    record.retries = attempt - 1;
                    record.latency_ms = latency_ms;
                    self.observability.record_call(&record);

                    if let Some(key) = key {
                        self.cache.put(CachedSubagentArtifact {
                            role: call.role,
                            key,
                            raw: completion.content.clone(),
                            payload,
                            hits: 0,
                            last_used: Utc::now(),
                        });
                    }

                    return Ok(SubagentResponse {
                        parsed,
                        raw: completion.content,
                        attempts: attempt,
                        model_used: model,
                        tier,
                        cache_hit: false,
                        latency_ms,
                    });
                }
                Err(e) => {
                    warn!(role = %call.role, attempt, error = %e, "Subagent output rejected");
                    last_error = e.to_string();
                    last_raw = completion.content;
                }
            }
        }

        record.failed = true;
        record.retries = self.max_attempts.saturating_sub(1);
        record.latency_ms = start.elapsed().as_millis() as u64;
        self.observability.record_call(&record);

        Err(SubagentError::ParseExhausted {
            role: call.role,
            attempts: self.max_attempts,
            error: last_error,
            raw: truncate(&last_raw, MAX_RAW_IN_ERROR),
        })
    }
}
