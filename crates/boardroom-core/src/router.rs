//! Router/orchestrator: the per-request pipeline.
//!
//! For each message: validate, resolve the routing decision (explicit hint or
//! keyword classifier), load history, invoke the completion client once per
//! selected persona (sequentially, with no cross-persona visibility inside a
//! turn), merge, and append the exchange to the thread.
//!
//! Read-modify-write cycles against one thread id are serialized by a
//! per-thread async mutex, so concurrent requests against the same thread
//! cannot silently drop each other's writes. The user and assistant turns are
//! written back in a single put only after every completion call succeeded;
//! a provider failure persists nothing for that request.

use crate::completion::{CompletionClient, CompletionRequest, Generation};
use crate::error::CoreError;
use crate::persona::{Persona, PersonaLibrary, RoutingDecision, classify_message};
use crate::retrieval::{RetrievalResult, Retriever};
use crate::thread_store::{ThreadStore, Turn};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Filler used when the provider returns an empty reply.
const EMPTY_REPLY_FALLBACK: &str = "Thanks! Let's continue.";

/// One incoming chat turn, decoupled from the HTTP request shape.
#[derive(Debug, Clone, Default)]
pub struct ChatTurnRequest {
    /// Absent or empty means a new thread; a fresh id is generated.
    pub thread_id: Option<String>,
    pub message: String,
    /// When present, used as provider context instead of the stored history.
    /// The persisted record still extends the stored history.
    pub history_override: Option<Vec<Turn>>,
    /// Explicit persona hint; bypasses the classifier when present.
    pub persona_hint: Option<String>,
    /// Replaces the resolved persona instruction for this request only.
    pub system_prompt: Option<String>,
    pub stream: bool,
}

/// The reply in whichever representation the request asked for.
#[derive(Debug)]
pub enum ReplyBody {
    Full(String),
    Fragments(mpsc::Receiver<Result<String, CoreError>>),
}

#[derive(Debug)]
pub struct ChatOutcome {
    pub thread_id: String,
    /// Resolved route, e.g. "cto" or "committee".
    pub phase: &'static str,
    pub body: ReplyBody,
    /// Always empty until retrieval is implemented.
    pub citations: Vec<RetrievalResult>,
}

pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    store: Arc<ThreadStore>,
    personas: PersonaLibrary,
    retriever: Retriever,
    /// Per-thread serialization points for the read-modify-write cycle.
    /// Entries are evicted once the last guard for a thread drops.
    thread_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Drop a thread's lock entry once nothing but the map itself holds it.
/// `remove_if` holds the shard lock while checking, and every new clone goes
/// through `thread_lock` under that same shard lock, so the count cannot rise
/// between the check and the removal.
fn release_thread_lock(locks: &DashMap<String, Arc<Mutex<()>>>, thread_id: &str) {
    locks.remove_if(thread_id, |_, lock| Arc::strong_count(lock) == 1);
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<ThreadStore>,
        personas: PersonaLibrary,
    ) -> Self {
        Self {
            client,
            store,
            personas,
            retriever: Retriever,
            thread_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &ThreadStore {
        &self.store
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.thread_locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Instruction text for one selected persona, honoring the per-request
    /// system prompt override and the committee framing.
    fn instruction_for(
        &self,
        persona: Persona,
        committee: bool,
        override_text: Option<&str>,
    ) -> String {
        let base = override_text.unwrap_or_else(|| self.personas.instruction(persona));
        if committee {
            format!("{}\n\n{}", base, self.personas.committee_framing())
        } else {
            base.to_string()
        }
    }

    /// Handle one chat turn end to end.
    pub async fn handle(&self, req: ChatTurnRequest) -> Result<ChatOutcome, CoreError> {
        if req.message.trim().is_empty() {
            return Err(CoreError::EmptyMessage);
        }

        let decision = match req.persona_hint.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(hint) => RoutingDecision::from_hint(hint)?,
            None => classify_message(&req.message),
        };
        let thread_id = req
            .thread_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::info!(
            target: "boardroom::router",
            thread = %thread_id,
            phase = decision.phase(),
            stream = req.stream,
            "routing chat turn"
        );

        let committee = decision == RoutingDecision::Committee;
        let sections: Vec<(Persona, String)> = decision
            .personas()
            .into_iter()
            .map(|p| (p, self.instruction_for(p, committee, req.system_prompt.as_deref())))
            .collect();

        // Hold the per-thread lock across the whole read-modify-write cycle,
        // including the deferred write of the streaming path.
        let guard = self.thread_lock(&thread_id).lock_owned().await;

        let stored = self.store.get(&thread_id)?;
        let context: Vec<Turn> = req.history_override.clone().unwrap_or_else(|| stored.clone());
        let citations = self.retriever.retrieve(&req.message, 4).await;

        if !req.stream {
            let result = async {
                let mut parts: Vec<String> = Vec::with_capacity(sections.len());
                for (persona, instruction) in &sections {
                    let generation = self
                        .client
                        .generate(CompletionRequest {
                            instruction,
                            history: &context,
                            message: &req.message,
                            stream: false,
                        })
                        .await?;
                    let text = collect_generation(generation).await?;
                    parts.push(if committee {
                        format!("## {}\n{}", persona.label(), text)
                    } else {
                        text
                    });
                }
                let mut reply = parts.join("\n\n");
                if reply.trim().is_empty() {
                    reply = EMPTY_REPLY_FALLBACK.to_string();
                }

                let mut turns = stored;
                turns.push(Turn::user(&req.message));
                turns.push(Turn::assistant(&reply));
                self.store.put(&thread_id, turns)?;
                Ok::<String, CoreError>(reply)
            }
            .await;
            drop(guard);
            release_thread_lock(&self.thread_locks, &thread_id);
            let reply = result?;

            return Ok(ChatOutcome {
                thread_id,
                phase: decision.phase(),
                body: ReplyBody::Full(reply),
                citations,
            });
        }

        // Streaming: forward fragments as they arrive, accumulate the full
        // text, and persist after the last fragment. The guard moves into the
        // task so a concurrent request waits for this cycle to finish.
        let (out_tx, out_rx) = mpsc::channel::<Result<String, CoreError>>(32);
        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let message = req.message.clone();
        let tid = thread_id.clone();
        let locks = Arc::clone(&self.thread_locks);
        tokio::spawn(async move {
            {
                let _guard = guard;
                stream_turn(
                    &*client, &store, &out_tx, &sections, committee, &context, stored, &message,
                    &tid,
                )
                .await;
            }
            release_thread_lock(&locks, &tid);
        });

        Ok(ChatOutcome {
            thread_id,
            phase: decision.phase(),
            body: ReplyBody::Fragments(out_rx),
            citations,
        })
    }
}

/// Drive one streaming turn: forward fragments as they arrive, accumulate the
/// full text, persist after the last fragment. Every early exit persists
/// nothing for the turn.
#[allow(clippy::too_many_arguments)]
async fn stream_turn(
    client: &dyn CompletionClient,
    store: &ThreadStore,
    out_tx: &mpsc::Sender<Result<String, CoreError>>,
    sections: &[(Persona, String)],
    committee: bool,
    context: &[Turn],
    stored: Vec<Turn>,
    message: &str,
    thread_id: &str,
) {
    let mut full_text = String::new();
    for (idx, (persona, instruction)) in sections.iter().enumerate() {
        if committee {
            let header = if idx == 0 {
                format!("## {}\n", persona.label())
            } else {
                format!("\n\n## {}\n", persona.label())
            };
            full_text.push_str(&header);
            if out_tx.send(Ok(header)).await.is_err() {
                return; // client went away; nothing persisted
            }
        }
        let generation = client
            .generate(CompletionRequest {
                instruction,
                history: context,
                message,
                stream: true,
            })
            .await;
        match generation {
            Ok(Generation::Complete(text)) => {
                full_text.push_str(&text);
                if out_tx.send(Ok(text)).await.is_err() {
                    return;
                }
            }
            Ok(Generation::Fragments(mut rx)) => {
                while let Some(fragment) = rx.recv().await {
                    match fragment {
                        Ok(delta) => {
                            full_text.push_str(&delta);
                            if out_tx.send(Ok(delta)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            // Abort the turn: surface the error, persist nothing.
                            let _ = out_tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                let _ = out_tx.send(Err(e)).await;
                return;
            }
        }
    }

    if full_text.trim().is_empty() {
        full_text = EMPTY_REPLY_FALLBACK.to_string();
        let _ = out_tx.send(Ok(full_text.clone())).await;
    }

    let mut turns = stored;
    turns.push(Turn::user(message));
    turns.push(Turn::assistant(&full_text));
    if let Err(e) = store.put(thread_id, turns) {
        // Reply already delivered; the missing history entry is the
        // documented inconsistency window.
        tracing::warn!(target: "boardroom::router", thread = %thread_id, error = %e, "post-stream persistence failed");
    }
}

/// Drain a generation into a single string regardless of representation.
async fn collect_generation(generation: Generation) -> Result<String, CoreError> {
    match generation {
        Generation::Complete(text) => Ok(text),
        Generation::Fragments(mut rx) => {
            let mut out = String::new();
            while let Some(fragment) = rx.recv().await {
                out.push_str(&fragment?);
            }
            Ok(out)
        }
    }
}
