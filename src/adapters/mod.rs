//! Boundary collaborators of the sync core
//!
//! Stream transports (SSE, WebSocket), the REST history client, durable
//! stores, credential stores and notifiers, each behind a trait from
//! `traits` so feeds and actors get them injected.

pub mod credentials;
pub mod errors;
pub mod notify;
pub mod rest;
pub mod sse;
pub mod storage;
pub mod traits;
pub mod websocket;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use credentials::{EnvCredentialStore, StaticCredentials};
pub use errors::{
    FetchError, FetchResult, NotifyError, StorageError, StorageResult, StreamError, StreamResult,
};
pub use notify::{FanoutNotifier, LogNotifier, WebhookNotifier};
pub use rest::{RestClient, RestPaths};
pub use sse::SseTransport;
pub use storage::{JsonFileStore, MemoryStore};
pub use traits::{
    CredentialStore, DurableStore, FrameStream, FrameTransport, IntelligenceHistorySource, Notifier,
    ValuationHistorySource,
};
pub use websocket::{AutoTransport, WebSocketTransport};
