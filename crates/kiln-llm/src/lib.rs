//! Vendor-agnostic LLM client: rate limiting, key rotation, retry with
//! backoff, and cooperative batch polling sit in front of any
//! [`Provider`] implementation.
//!
//! [`http::HttpProvider`] is the one concrete `Provider` this crate
//! ships, against a generic JSON wire protocol — it sends whatever
//! bearer secret an [`ApiKey`] already carries and negotiates nothing.
//! A real vendor SDK with its own credential-acquisition flow lives
//! outside this workspace's scope (`spec.md` §1 lists "authentication to
//! LLM providers" as an explicit non-goal).

mod client;
mod error;
mod http;
mod keys;
mod limiter;
mod provider;
mod retry;

pub use client::{LlmClient, RateLimitClassifier, default_rate_limit_classifier};
pub use error::LlmError;
pub use http::{HttpEndpoints, HttpProvider};
pub use keys::{KeyRing, ModelKeys};
pub use limiter::RateLimiter;
pub use provider::{
	ApiKey, BatchHandle, BatchRequest, BatchResult, BatchStatus, EmbeddingRole, GenerationResponse, Message, Provider, ProviderError,
	RequestSettings, ResponseChunk, Role, ToolCall,
};
pub use retry::{RetryBudget, backoff_delay};
