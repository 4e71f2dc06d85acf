//! What each source of a fallback chain did for one failed call.

use std::fmt;

use serde::Serialize;

use crate::models::SourceId;

/// Why a source in the chain was passed over without being queried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The source is the provider whose call just failed.
    FailedProvider,
    /// The tier is switched off in the configuration.
    Disabled,
    /// No collaborator is registered under this id for the call.
    NotRegistered,
    /// No collaborator holds a cached result for the request.
    CacheMiss,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedProvider => "failed provider",
            Self::Disabled => "disabled",
            Self::NotRegistered => "not registered",
            Self::CacheMiss => "cache miss",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Skipped { reason: SkipReason },
    Failed { error: String },
    Served,
}

/// One source of the chain and its outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrailStep {
    pub source: SourceId,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Ordered outcomes of a fallback walk.
///
/// Carried by [`ResilienceError::DataUnavailable`](crate::ResilienceError)
/// so callers can tell a cache miss from a disabled tier or a failing
/// alternate provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FallbackTrail {
    steps: Vec<TrailStep>,
}

impl FallbackTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn skip(&mut self, source: SourceId, reason: SkipReason) {
        self.push(source, StepOutcome::Skipped { reason });
    }

    pub(crate) fn fail(&mut self, source: SourceId, error: impl Into<String>) {
        self.push(
            source,
            StepOutcome::Failed {
                error: error.into(),
            },
        );
    }

    pub(crate) fn serve(&mut self, source: SourceId) {
        self.push(source, StepOutcome::Served);
    }

    fn push(&mut self, source: SourceId, outcome: StepOutcome) {
        self.steps.push(TrailStep { source, outcome });
    }

    pub fn steps(&self) -> &[TrailStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sources that were actually queried, in chain order.
    pub fn queried(&self) -> impl Iterator<Item = &SourceId> {
        self.steps
            .iter()
            .filter(|step| !matches!(step.outcome, StepOutcome::Skipped { .. }))
            .map(|step| &step.source)
    }

    pub fn served_by(&self) -> Option<&SourceId> {
        self.steps
            .iter()
            .find(|step| step.outcome == StepOutcome::Served)
            .map(|step| &step.source)
    }
}

impl fmt::Display for FallbackTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("no sources walked");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &step.outcome {
                StepOutcome::Skipped { reason } => {
                    write!(f, "{} skipped ({})", step.source, reason.as_str())?
                }
                StepOutcome::Failed { error } => write!(f, "{} failed ({})", step.source, error)?,
                StepOutcome::Served => write!(f, "{} served", step.source)?,
            }
        }
        Ok(())
    }
}
