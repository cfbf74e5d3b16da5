//! End-to-end turn tests against an in-memory SQLite store and a
//! scripted provider.

use async_trait::async_trait;
use coursepilot_config::AppConfig;
use coursepilot_core::chat::{AnswerMode, Sender};
use coursepilot_core::error::{Error, ProviderError};
use coursepilot_core::passage::Passage;
use coursepilot_core::provider::{
    EmbeddingRequest, EmbeddingResponse, GenerationRequest, GenerationResponse, Provider, Usage,
};
use coursepilot_core::store::PassageStore;
use coursepilot_store::SqliteStore;
use coursepilot_tutor::ChatService;
use std::sync::Arc;
use std::time::Duration;

/// A provider that returns a fixed reply and embeds everything to the
/// same unit vector.
struct ScriptedProvider {
    reply: String,
    total_tokens: u32,
    delay: Option<Duration>,
    fail: bool,
}

impl ScriptedProvider {
    fn replying(reply: &str, total_tokens: u32) -> Self {
        Self {
            reply: reply.into(),
            total_tokens,
            delay: None,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            reply: String::new(),
            total_tokens: 0,
            delay: None,
            fail: true,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            reply: "late".into(),
            total_tokens: 10,
            delay: Some(delay),
            fail: false,
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "upstream down".into(),
            });
        }
        Ok(GenerationResponse {
            text: self.reply.clone(),
            usage: Some(Usage {
                prompt_tokens: self.total_tokens / 2,
                completion_tokens: self.total_tokens - self.total_tokens / 2,
                total_tokens: self.total_tokens,
            }),
            model: "scripted".into(),
        })
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|_| vec![1.0, 0.0, 0.0]).collect(),
            model: "scripted-embed".into(),
            usage: None,
        })
    }
}

async fn seed_passage(store: &SqliteStore, id: &str, course_id: &str, title: &str, text: &str) {
    store
        .insert_passage(Passage {
            id: id.into(),
            content_file_id: "file-1".into(),
            course_id: course_id.into(),
            text: text.into(),
            position: 0,
            source_title: title.into(),
            page_number: Some(12),
            section_heading: None,
            similarity: 0.0,
            embedding: Some(vec![1.0, 0.0, 0.0]),
        })
        .await
        .unwrap();
}

async fn service_with(provider: ScriptedProvider, config: AppConfig) -> (ChatService, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    let service = ChatService::new(
        Arc::new(provider),
        store.clone(),
        store.clone(),
        store.clone(),
        &config,
    );
    (service, store)
}

#[tokio::test]
async fn grounded_turn_persists_both_messages_and_citations() {
    let provider = ScriptedProvider::replying("According to Lecture 3, entropy is disorder.", 150);
    let (service, store) = service_with(provider, AppConfig::default()).await;
    seed_passage(&store, "p1", "c1", "Lecture 3", "Entropy measures disorder.").await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    let outcome = service
        .send_message(&thread.id, "u1", "c1", "What is entropy?", None)
        .await
        .unwrap();

    assert_eq!(outcome.user_message.sender, Sender::User);
    assert_eq!(outcome.assistant_message.sender, Sender::Assistant);
    assert_eq!(
        outcome.assistant_message.answer_mode,
        Some(AnswerMode::CourseGrounded)
    );
    assert_eq!(outcome.assistant_message.passage_ids, vec!["p1".to_string()]);
    assert_eq!(outcome.citations.len(), 1);
    assert_eq!(outcome.citations[0].source_title, "Lecture 3");

    // Both messages persisted in order
    let messages = service.get_messages(&thread.id, "u1", 50, 0).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message.sender, Sender::User);
    assert_eq!(messages[1].message.sender, Sender::Assistant);
    assert_eq!(messages[1].citations.len(), 1);

    // Actual usage recorded
    assert_eq!(service.get_usage_today("u1", "c1").await.unwrap(), 150);
}

#[tokio::test]
async fn empty_course_turn_is_outside_material() {
    let provider = ScriptedProvider::replying("In general, entropy is disorder.", 80);
    let (service, _store) = service_with(provider, AppConfig::default()).await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    let outcome = service
        .send_message(&thread.id, "u1", "c1", "What is entropy?", None)
        .await
        .unwrap();

    assert_eq!(
        outcome.assistant_message.answer_mode,
        Some(AnswerMode::OutsideMaterial)
    );
    assert!(outcome.assistant_message.passage_ids.is_empty());
    assert!(outcome.citations.is_empty());
}

#[tokio::test]
async fn budget_rejection_happens_before_any_persistence() {
    let mut config = AppConfig::default();
    // "hi" estimates to 0 + 500 margin; 0 + 500 < 500 is false
    config.max_tokens_per_user_per_day = 500;
    let provider = ScriptedProvider::replying("never sent", 10);
    let (service, _store) = service_with(provider, config).await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    let err = service
        .send_message(&thread.id, "u1", "c1", "hi", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BudgetExceeded { .. }));
    assert!(err.to_string().contains("try again tomorrow"));

    // Nothing persisted, nothing spent
    let messages = service.get_messages(&thread.id, "u1", 50, 0).await.unwrap();
    assert!(messages.is_empty());
    assert_eq!(service.get_usage_today("u1", "c1").await.unwrap(), 0);
}

#[tokio::test]
async fn budget_boundary_just_under_is_allowed() {
    let mut config = AppConfig::default();
    // estimate = 500; 0 + 500 < 501 holds
    config.max_tokens_per_user_per_day = 501;
    let provider = ScriptedProvider::replying("ok", 10);
    let (service, _store) = service_with(provider, config).await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    service
        .send_message(&thread.id, "u1", "c1", "hi", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn first_message_titles_the_thread_once() {
    let provider = ScriptedProvider::replying("answer", 10);
    let (service, _store) = service_with(provider, AppConfig::default()).await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    let long_question = format!("{} and some trailing detail", "w".repeat(60));
    service
        .send_message(&thread.id, "u1", "c1", &long_question, None)
        .await
        .unwrap();

    let fetched = service.get_thread(&thread.id, "u1").await.unwrap();
    let title = fetched.title.unwrap();
    assert_eq!(title.chars().count(), 53);
    assert!(title.ends_with("..."));

    // A later message never retitles
    service
        .send_message(&thread.id, "u1", "c1", "second question", None)
        .await
        .unwrap();
    let fetched = service.get_thread(&thread.id, "u1").await.unwrap();
    assert_eq!(fetched.title.unwrap(), title);
}

#[tokio::test]
async fn explicit_title_is_never_overwritten() {
    let provider = ScriptedProvider::replying("answer", 10);
    let (service, _store) = service_with(provider, AppConfig::default()).await;

    let thread = service
        .create_thread("u1", "c1", Some("Office hours prep"))
        .await
        .unwrap();
    service
        .send_message(&thread.id, "u1", "c1", "Something else entirely", None)
        .await
        .unwrap();

    let fetched = service.get_thread(&thread.id, "u1").await.unwrap();
    assert_eq!(fetched.title.as_deref(), Some("Office hours prep"));
}

#[tokio::test]
async fn foreign_thread_is_not_found() {
    let provider = ScriptedProvider::replying("answer", 10);
    let (service, _store) = service_with(provider, AppConfig::default()).await;

    let thread = service.create_thread("owner", "c1", None).await.unwrap();

    let err = service.get_thread(&thread.id, "intruder").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = service
        .send_message(&thread.id, "intruder", "c1", "hi", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = service
        .delete_thread(&thread.id, "intruder")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // The owner still sees it
    assert!(service.get_thread(&thread.id, "owner").await.is_ok());
}

#[tokio::test]
async fn provider_failure_keeps_the_user_message() {
    let (service, _store) = service_with(ScriptedProvider::failing(), AppConfig::default()).await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    let err = service
        .send_message(&thread.id, "u1", "c1", "What is entropy?", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider(_)));

    let messages = service.get_messages(&thread.id, "u1", 50, 0).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message.sender, Sender::User);
    assert_eq!(service.get_usage_today("u1", "c1").await.unwrap(), 0);
}

#[tokio::test]
async fn generation_deadline_surfaces_as_timeout() {
    let mut config = AppConfig::default();
    config.generation_timeout_secs = 0;
    let provider = ScriptedProvider::slow(Duration::from_secs(30));
    let (service, _store) = service_with(provider, config).await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    let err = service
        .send_message(&thread.id, "u1", "c1", "slow question", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Provider(ProviderError::Timeout(_))
    ));

    // The user message is kept even though no answer arrived
    let messages = service.get_messages(&thread.id, "u1", 50, 0).await.unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn delete_thread_removes_history() {
    let provider = ScriptedProvider::replying("answer", 10);
    let (service, _store) = service_with(provider, AppConfig::default()).await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    service
        .send_message(&thread.id, "u1", "c1", "hello", None)
        .await
        .unwrap();

    service.delete_thread(&thread.id, "u1").await.unwrap();
    let err = service.get_thread(&thread.id, "u1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn list_threads_is_scoped_and_counted() {
    let provider = ScriptedProvider::replying("answer", 10);
    let (service, _store) = service_with(provider, AppConfig::default()).await;

    service.create_thread("u1", "c1", None).await.unwrap();
    service.create_thread("u1", "c1", None).await.unwrap();
    service.create_thread("u1", "c2", None).await.unwrap();
    service.create_thread("u2", "c1", None).await.unwrap();

    let (threads, total) = service.list_threads("u1", "c1", 10, 0).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(threads.len(), 2);
}

#[tokio::test]
async fn remaining_budget_shrinks_with_usage() {
    let mut config = AppConfig::default();
    config.max_tokens_per_user_per_day = 1_000;
    let provider = ScriptedProvider::replying("answer", 150);
    let (service, _store) = service_with(provider, config).await;

    assert_eq!(service.get_remaining_budget("u1", "c1").await.unwrap(), 1_000);

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    service
        .send_message(&thread.id, "u1", "c1", "hello", None)
        .await
        .unwrap();

    assert_eq!(service.get_remaining_budget("u1", "c1").await.unwrap(), 850);
}

#[tokio::test]
async fn marker_in_reply_overrides_retrieval() {
    let provider = ScriptedProvider::replying(
        "[Outside Course Material] This is general knowledge.",
        50,
    );
    let (service, store) = service_with(provider, AppConfig::default()).await;
    seed_passage(&store, "p1", "c1", "Lecture 3", "Entropy measures disorder.").await;

    let thread = service.create_thread("u1", "c1", None).await.unwrap();
    let outcome = service
        .send_message(&thread.id, "u1", "c1", "What is entropy?", None)
        .await
        .unwrap();

    assert_eq!(
        outcome.assistant_message.answer_mode,
        Some(AnswerMode::OutsideMaterial)
    );
    // Passage ids are still recorded for the history view
    assert_eq!(outcome.assistant_message.passage_ids, vec!["p1".to_string()]);
}
