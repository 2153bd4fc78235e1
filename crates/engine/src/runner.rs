//! The tool-calling orchestration loop.
//!
//! One [`ChatEngine::ask`] call owns one user prompt end to end: it
//! replays the stored context, persists the prompt, and rounds with the
//! model until it stops, every round's messages committing atomically.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tabletalk_core::{
    ChatClient, ChatError, ChatMessage, ChatRequest, FinishReason, MessageStore, NewMessage, Role,
    ToolGateway,
};

use crate::assembler::assemble;
use crate::dispatch;

/// Persisted in place of an empty tool result so the model always sees
/// a non-empty turn.
pub const FALLBACK_REPLY: &str = "Sorry for the problem, I will check again.";

/// The orchestration engine: model client, message store, and tool
/// gateway wired together behind per-conversation serialization.
pub struct ChatEngine {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn MessageStore>,
    gateway: Arc<dyn ToolGateway>,
    /// Rounds allowed before the loop gives up.
    max_rounds: u32,
    /// One lock per conversation; concurrent prompts to the same
    /// conversation queue instead of interleaving appends.
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatEngine {
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn MessageStore>,
        gateway: Arc<dyn ToolGateway>,
        max_rounds: u32,
    ) -> Self {
        Self {
            client,
            store,
            gateway,
            max_rounds,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn conversation_lock(&self, conversation_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run one prompt through the loop and return the final reply text.
    ///
    /// The prompt commits before the first model call. Each tool round
    /// then commits atomically: the intermediate assistant turn plus
    /// every tool reply, in call order, or nothing if the round fails
    /// validation. The final reply commits before the caller streams it.
    pub async fn ask(&self, conversation_id: i64, prompt: &str) -> Result<String, ChatError> {
        let lock = self.conversation_lock(conversation_id).await;
        let _guard = lock.lock().await;

        info!(conversation_id, "processing prompt");

        let replay = self.store.context(conversation_id).await?;
        let mut messages = assemble(replay);

        let tools = self.gateway.list_tools().await?;

        messages.push(ChatMessage::new(Role::User, prompt));
        self.store
            .append(NewMessage::user_prompt(conversation_id, prompt))
            .await?;

        for round in 1..=self.max_rounds {
            debug!(conversation_id, round, "model round");

            let completion = self
                .client
                .send(ChatRequest {
                    messages: messages.clone(),
                    tools: tools.clone(),
                    temperature: 0.0,
                    allow_multiple_tool_calls: true,
                })
                .await?;

            match completion.finish_reason {
                FinishReason::ToolCalls => {
                    let mut pending = vec![NewMessage::intermediate(
                        conversation_id,
                        completion.text.clone(),
                    )];
                    messages.push(ChatMessage::new(Role::Assistant, completion.text.clone()));

                    for call in &completion.tool_calls {
                        let contract = dispatch::validate(call)?;
                        let args = contract.forwarded_args(&call.arguments);

                        debug!(conversation_id, tool = contract.name, "invoking tool");
                        let outcome = self.gateway.invoke(contract.name, args).await?;

                        if !outcome.success {
                            warn!(
                                conversation_id,
                                tool = contract.name,
                                "tool reported failure"
                            );
                        }

                        // An empty result would give the model nothing
                        // to react to; substitute the fallback turn.
                        if outcome.text.is_empty() {
                            messages.push(ChatMessage::new(Role::Assistant, FALLBACK_REPLY));
                            pending.push(NewMessage::tool_reply(
                                conversation_id,
                                Role::Assistant,
                                FALLBACK_REPLY,
                            ));
                        } else {
                            messages.push(ChatMessage::tool_result(
                                call.id.clone(),
                                outcome.text.clone(),
                            ));
                            pending.push(NewMessage::tool_reply(
                                conversation_id,
                                Role::Tool,
                                outcome.text,
                            ));
                        }
                    }

                    self.store.append_round(pending).await?;
                }
                FinishReason::Stop => {
                    self.store
                        .append(NewMessage::final_reply(
                            conversation_id,
                            completion.text.clone(),
                        ))
                        .await?;
                    info!(conversation_id, round, "final reply persisted");
                    return Ok(completion.text);
                }
                FinishReason::Other(reason) => {
                    warn!(conversation_id, %reason, "provider returned unexpected finish reason");
                    return Err(ChatError::UnknownFinishReason);
                }
            }
        }

        warn!(
            conversation_id,
            max_rounds = self.max_rounds,
            "round ceiling reached without a final reply"
        );
        Err(ChatError::ToolLoopExceeded(self.max_rounds))
    }
}
