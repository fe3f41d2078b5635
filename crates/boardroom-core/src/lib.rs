//! boardroom-core: personas, routing orchestrator, thread store, and the
//! completion bridge behind the chat gateway.
//!
//! The gateway crate consumes this library through the re-exports below; the
//! HTTP surface itself lives in `boardroom-gateway`.

mod completion;
mod config;
mod error;
mod persona;
mod prompts;
mod retrieval;
mod router;
mod thread_store;

pub use completion::{CompletionClient, CompletionRequest, Generation, OpenAiBridge};
pub use config::{GatewayConfig, split_origins};
pub use error::CoreError;
pub use persona::{
    COMMITTEE_MEMBERS, Persona, PersonaLibrary, RoutingDecision, classify_message,
};
pub use retrieval::{RetrievalResult, Retriever};
pub use router::{ChatOutcome, ChatTurnRequest, Orchestrator, ReplyBody};
pub use thread_store::{Role, ThreadRecord, ThreadStore, Turn};
