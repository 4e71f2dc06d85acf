//! Fallback chain resolution.
//!
//! When a provider call has exhausted its retries, the resolver walks an
//! ordered chain of alternate sources for the requested subject:
//!
//! ```text
//! subject key ──> FallbackPriority ──> [provider, provider, cache, placeholder]
//!                                          │
//!                                          ▼
//!                           first source that answers wins
//! ```
//!
//! Each source gets exactly one attempt and sources are tried one after the
//! other, never concurrently. When the chain is exhausted the returned error
//! carries a [`FallbackTrail`] of every source's outcome.

mod priority;
mod resolver;
mod trail;

pub use priority::FallbackPriority;
pub use resolver::{placeholder_payload, FallbackChainResolver};
pub use trail::{FallbackTrail, SkipReason, StepOutcome, TrailStep};
