//! The turn orchestrator.
//!
//! `ChatService` is the single entry point the transport layer calls.
//! It owns the provider handle, the store handles, the budget ledger,
//! and the retrieval engine, and it sequences a conversational turn:
//! budget pre-check, persist, retrieve, prompt, generate, classify,
//! persist, record.
//!
//! There are no internal retries. A failure at any stage propagates to
//! the caller with its kind; state persisted before the failure is
//! deliberately kept (a user message survives a provider outage).

use crate::budget::{estimate_tokens, BudgetLedger, RESPONSE_MARGIN};
use crate::retrieval::{format_context, RetrievalEngine};
use crate::{citation, classify, prompt};
use coursepilot_config::AppConfig;
use coursepilot_core::chat::{ChatMessage, ChatThread};
use coursepilot_core::error::{Error, ProviderError, Result};
use coursepilot_core::passage::Citation;
use coursepilot_core::provider::{GenerationRequest, Provider};
use coursepilot_core::store::{BudgetStore, NewMessage, PassageStore, ThreadStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum characters of the first message used as a thread title.
const TITLE_MAX_CHARS: usize = 50;

/// Everything a completed turn hands back to the transport layer.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
    pub citations: Vec<Citation>,
}

/// A historical message with its citations reconstructed.
#[derive(Debug, Clone)]
pub struct MessageWithCitations {
    pub message: ChatMessage,
    pub citations: Vec<Citation>,
}

/// The conversation service.
pub struct ChatService {
    threads: Arc<dyn ThreadStore>,
    passages: Arc<dyn PassageStore>,
    provider: Arc<dyn Provider>,
    budget: BudgetLedger,
    retrieval: RetrievalEngine,
    chat_model: String,
    max_output_tokens: u32,
    temperature: f32,
    generation_timeout: Duration,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn Provider>,
        threads: Arc<dyn ThreadStore>,
        passages: Arc<dyn PassageStore>,
        budgets: Arc<dyn BudgetStore>,
        config: &AppConfig,
    ) -> Self {
        let budget = BudgetLedger::new(budgets, config.max_tokens_per_user_per_day);
        let retrieval = RetrievalEngine::new(
            provider.clone(),
            passages.clone(),
            config.embedding_model.clone(),
            config.retrieval_top_k,
        );

        Self {
            threads,
            passages,
            provider,
            budget,
            retrieval,
            chat_model: config.chat_model.clone(),
            max_output_tokens: config.max_tokens_per_request,
            temperature: config.temperature,
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
        }
    }

    /// Create a new thread for the user in a course.
    pub async fn create_thread(
        &self,
        user_id: &str,
        course_id: &str,
        title: Option<&str>,
    ) -> Result<ChatThread> {
        let thread = self.threads.create_thread(course_id, user_id, title).await?;
        info!(thread_id = %thread.id, course_id, "Created thread");
        Ok(thread)
    }

    /// Fetch a thread. A thread owned by someone else looks exactly
    /// like a missing one.
    pub async fn get_thread(&self, thread_id: &str, user_id: &str) -> Result<ChatThread> {
        self.threads
            .get_thread(thread_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("thread {thread_id}")))
    }

    /// List the user's threads in a course, newest first, with the
    /// total count for pagination.
    pub async fn list_threads(
        &self,
        user_id: &str,
        course_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<ChatThread>, u64)> {
        Ok(self
            .threads
            .list_threads(user_id, course_id, limit, offset)
            .await?)
    }

    /// Delete a thread and all its messages.
    pub async fn delete_thread(&self, thread_id: &str, user_id: &str) -> Result<()> {
        let deleted = self.threads.delete_thread(thread_id, user_id).await?;
        if !deleted {
            return Err(Error::NotFound(format!("thread {thread_id}")));
        }
        info!(thread_id, "Deleted thread");
        Ok(())
    }

    /// List a thread's messages in creation order, with citations
    /// reconstructed from the stored passage ids.
    pub async fn get_messages(
        &self,
        thread_id: &str,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageWithCitations>> {
        // Ownership gate first; leaks nothing about foreign threads
        self.get_thread(thread_id, user_id).await?;

        let messages = self.threads.list_messages(thread_id, limit, offset).await?;

        let mut out = Vec::with_capacity(messages.len());
        for message in messages {
            let citations = citation::from_ids(self.passages.as_ref(), &message.passage_ids).await?;
            out.push(MessageWithCitations { message, citations });
        }
        Ok(out)
    }

    /// Tokens the user can still spend today in this course.
    pub async fn get_remaining_budget(&self, user_id: &str, course_id: &str) -> Result<u32> {
        self.budget.remaining(user_id, course_id).await
    }

    /// Tokens the user has consumed today in this course.
    pub async fn get_usage_today(&self, user_id: &str, course_id: &str) -> Result<u32> {
        self.budget.usage_today(user_id, course_id).await
    }

    /// Run a full conversational turn.
    pub async fn send_message(
        &self,
        thread_id: &str,
        user_id: &str,
        course_id: &str,
        text: &str,
        system_prompt: Option<&str>,
    ) -> Result<TurnOutcome> {
        let thread = self.get_thread(thread_id, user_id).await?;

        // Budget pre-check, before anything is persisted
        let estimated = estimate_tokens(text) + RESPONSE_MARGIN;
        if !self.budget.has_capacity(user_id, course_id, estimated).await? {
            debug!(user_id, course_id, estimated, "Budget pre-check rejected turn");
            return Err(Error::BudgetExceeded {
                message: "Daily token budget exceeded. Please try again tomorrow.".into(),
            });
        }

        // History is captured before the new message lands so the
        // prompt window holds prior turns only
        let prior_count = thread.message_count;
        let history_offset = prior_count.saturating_sub(prompt::HISTORY_WINDOW as u64);
        let history = self
            .threads
            .list_messages(
                thread_id,
                prompt::HISTORY_WINDOW as u32,
                history_offset as u32,
            )
            .await?;

        let user_message = self
            .threads
            .insert_message(NewMessage::user(thread_id, text))
            .await?;

        // First message into an untitled thread names the thread
        if prior_count == 0 && thread.title.is_none() {
            self.threads
                .set_title(thread_id, &derive_title(text))
                .await?;
        }

        let retrieved = self.retrieval.retrieve(text, course_id, None).await?;
        let context = format_context(&retrieved);

        let messages = prompt::build(text, &context, &history, system_prompt);

        let request = GenerationRequest {
            model: self.chat_model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: Some(self.max_output_tokens),
        };

        let response = match tokio::time::timeout(
            self.generation_timeout,
            self.provider.complete(request),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                // The user message stays; the turn just has no answer
                warn!(thread_id, "Generation deadline expired");
                return Err(ProviderError::Timeout(format!(
                    "generation exceeded {}s",
                    self.generation_timeout.as_secs()
                ))
                .into());
            }
        };

        let answer_mode = classify::classify(&response.text, &retrieved);
        let passage_ids: Vec<String> = retrieved.iter().map(|p| p.id.clone()).collect();

        let assistant_message = self
            .threads
            .insert_message(NewMessage::assistant(
                thread_id,
                &*response.text,
                answer_mode,
                passage_ids,
            ))
            .await?;

        let total_tokens = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0);
        self.budget.record(user_id, course_id, total_tokens).await?;

        info!(
            thread_id,
            mode = answer_mode.as_str(),
            sources = retrieved.len(),
            tokens = total_tokens,
            "Turn complete"
        );

        Ok(TurnOutcome {
            user_message,
            assistant_message,
            citations: citation::from_passages(&retrieved),
        })
    }
}

/// Thread title from a first message: the first 50 characters, with an
/// ellipsis only when the message is longer.
fn derive_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_title_is_unchanged() {
        assert_eq!(derive_title("What is entropy?"), "What is entropy?");
    }

    #[test]
    fn exactly_fifty_chars_is_unchanged() {
        let text = "a".repeat(50);
        assert_eq!(derive_title(&text), text);
    }

    #[test]
    fn long_title_is_cut_with_ellipsis() {
        let text = "a".repeat(80);
        let title = derive_title(&text);
        assert_eq!(title.len(), 53);
        assert!(title.ends_with("..."));
    }
}
