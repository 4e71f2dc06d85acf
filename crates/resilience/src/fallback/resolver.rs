use chrono::Utc;
use log::{debug, info, warn};
use serde_json::{json, Value};

use super::{FallbackPriority, FallbackTrail, SkipReason};
use crate::config::RetryConfig;
use crate::errors::{classify, ClassifiedError, ResilienceError};
use crate::models::{CallOptions, Provenance, ServiceResponse, SourceId};

/// Walks the fallback chain for a failed provider call.
#[derive(Clone, Debug, Default)]
pub struct FallbackChainResolver {
    priorities: FallbackPriority,
}

impl FallbackChainResolver {
    pub fn new(priorities: FallbackPriority) -> Self {
        Self { priorities }
    }

    pub fn priorities(&self) -> &FallbackPriority {
        &self.priorities
    }

    /// Resolve a result for a call to `provider` that failed with `failure`.
    ///
    /// Fails with [`ResilienceError::DataUnavailable`] when no source in the
    /// chain produced a result. The error's trail records what every source
    /// in the chain did.
    pub async fn resolve(
        &self,
        provider: &str,
        failure: &ClassifiedError,
        options: &CallOptions,
        config: &RetryConfig,
    ) -> Result<ServiceResponse, ResilienceError> {
        let subject = options.subject_or_default();
        let mut trail = FallbackTrail::new();

        if !config.enable_fallbacks {
            debug!("Fallbacks disabled, not resolving '{}' for '{}'", subject, provider);
            return Err(unavailable(provider, subject, failure, trail));
        }

        let request = options.source_request();

        for source in self.priorities.chain_for(subject) {
            if source.is_provider(provider) {
                trail.skip(source.clone(), SkipReason::FailedProvider);
                continue;
            }

            let response = match source {
                SourceId::Cache => {
                    if !config.fallback_to_cached {
                        trail.skip(SourceId::Cache, SkipReason::Disabled);
                        continue;
                    }

                    let Some((holder, entry)) =
                        options.collaborators.latest_cached(&request.cache_key)
                    else {
                        trail.skip(SourceId::Cache, SkipReason::CacheMiss);
                        continue;
                    };

                    let age = Utc::now().signed_duration_since(entry.timestamp);
                    info!(
                        "Serving cached '{}' from '{}' ({}s old) after '{}' failed",
                        request.cache_key,
                        holder,
                        age.num_seconds(),
                        provider
                    );
                    ServiceResponse {
                        data: entry.data,
                        provenance: Provenance::Cache {
                            original_service: provider.to_string(),
                            cached_at: entry.timestamp,
                            cache_age: age.num_seconds().max(0),
                            original_error: failure.message.clone(),
                        },
                    }
                }
                SourceId::Placeholder => {
                    if !config.fallback_to_placeholder {
                        trail.skip(SourceId::Placeholder, SkipReason::Disabled);
                        continue;
                    }

                    warn!(
                        "Serving placeholder data for '{}' after '{}' failed",
                        subject, provider
                    );
                    ServiceResponse {
                        data: placeholder_payload(subject, options.placeholder.as_ref()),
                        provenance: Provenance::Placeholder {
                            original_service: provider.to_string(),
                            original_error: failure.message.clone(),
                        },
                    }
                }
                SourceId::Provider(id) => {
                    let Some(collaborator) = options.collaborators.get(id) else {
                        debug!("No collaborator registered for '{}', skipping", id);
                        trail.skip(source.clone(), SkipReason::NotRegistered);
                        continue;
                    };

                    match collaborator.query(&request).await {
                        Ok(data) => {
                            info!("Fallback source '{}' answered for '{}'", id, provider);
                            ServiceResponse {
                                data,
                                provenance: Provenance::Fallback {
                                    original_service: provider.to_string(),
                                    fallback_source: id.to_string(),
                                    original_error: failure.message.clone(),
                                },
                            }
                        }
                        Err(e) => {
                            warn!(
                                "Fallback source '{}' failed ({}): {}, trying next",
                                id,
                                classify(&e),
                                e
                            );
                            trail.fail(source.clone(), e.to_string());
                            continue;
                        }
                    }
                }
            };

            trail.serve(source.clone());
            debug!("Fallback chain for '{}': {}", subject, trail);
            return Ok(response);
        }

        warn!("Fallback chain for '{}' exhausted: {}", subject, trail);
        Err(unavailable(provider, subject, failure, trail))
    }
}

fn unavailable(
    provider: &str,
    subject: &str,
    failure: &ClassifiedError,
    trail: FallbackTrail,
) -> ResilienceError {
    ResilienceError::DataUnavailable {
        provider: provider.to_string(),
        kind: failure.kind,
        subject: subject.to_string(),
        message: failure.message.clone(),
        trail,
    }
}

/// Zero-valued payload flagged as placeholder data.
///
/// A caller-supplied object is used as the base when given; the
/// `dataQuality` marker is always set.
pub fn placeholder_payload(subject: &str, template: Option<&Value>) -> Value {
    let mut payload = match template {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({
            "subject": subject,
            "cases": 0,
            "deaths": 0,
            "recovered": 0,
            "active": 0,
            "records": [],
        }),
    };

    if let Value::Object(map) = &mut payload {
        map.insert("dataQuality".to_string(), json!("placeholder"));
        map.insert("generatedAt".to_string(), json!(Utc::now()));
    }
    payload
}
