//! Retrieval engine — query embedding plus similarity search.
//!
//! Retrieval is strictly course-scoped: a query against course A never
//! returns passages from course B. An unindexed course simply yields no
//! passages; the caller degrades to an ungrounded answer rather than
//! failing the turn.

use coursepilot_core::error::{ProviderError, Result};
use coursepilot_core::passage::Passage;
use coursepilot_core::provider::{EmbeddingRequest, Provider};
use coursepilot_core::store::PassageStore;
use std::sync::Arc;
use tracing::debug;

/// Embeds queries and searches the passage store.
pub struct RetrievalEngine {
    provider: Arc<dyn Provider>,
    passages: Arc<dyn PassageStore>,
    embedding_model: String,
    top_k: usize,
}

impl RetrievalEngine {
    pub fn new(
        provider: Arc<dyn Provider>,
        passages: Arc<dyn PassageStore>,
        embedding_model: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            provider,
            passages,
            embedding_model: embedding_model.into(),
            top_k,
        }
    }

    /// Retrieve the passages most similar to `query` within one course.
    ///
    /// `top_k` overrides the configured default when given. Results are
    /// ranked by descending similarity; ties keep the store's order.
    pub async fn retrieve(
        &self,
        query: &str,
        course_id: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<Passage>> {
        let k = top_k.unwrap_or(self.top_k);

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![query.to_string()],
            })
            .await?;

        let embedding = response.embeddings.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse("embedding response had no vectors".into())
        })?;

        let results = self
            .passages
            .search_by_embedding(course_id, &embedding, k)
            .await?;

        debug!(course_id, k, found = results.len(), "Retrieved passages");
        Ok(results)
    }

    /// Whether the course has any indexed content at all.
    pub async fn has_content(&self, course_id: &str) -> Result<bool> {
        Ok(self.passages.has_content(course_id).await?)
    }
}

/// Format retrieved passages into the context block for the prompt.
///
/// One numbered source header per passage, in input order, then the
/// passage text. Blocks are separated by `---` dividers. Empty input
/// produces an empty string.
pub fn format_context(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = passages
        .iter()
        .enumerate()
        .map(|(i, passage)| {
            let mut header = format!("[Source {}] {}", i + 1, passage.source_title);
            if let Some(page) = passage.page_number {
                header.push_str(&format!(", Page {page}"));
            }
            if let Some(heading) = &passage.section_heading {
                header.push_str(&format!(" - {heading}"));
            }
            format!("{header}\n{}\n", passage.text)
        })
        .collect();

    parts.join("\n---\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(
        title: &str,
        page: Option<u32>,
        heading: Option<&str>,
        text: &str,
    ) -> Passage {
        Passage {
            id: "p1".into(),
            content_file_id: "f1".into(),
            course_id: "c1".into(),
            text: text.into(),
            position: 0,
            source_title: title.into(),
            page_number: page,
            section_heading: heading.map(String::from),
            similarity: 0.9,
            embedding: None,
        }
    }

    #[test]
    fn empty_passages_empty_context() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn header_includes_all_metadata() {
        let ctx = format_context(&[passage(
            "Lecture 3",
            Some(12),
            Some("Entropy"),
            "Entropy measures disorder.",
        )]);
        assert_eq!(
            ctx,
            "[Source 1] Lecture 3, Page 12 - Entropy\nEntropy measures disorder.\n"
        );
    }

    #[test]
    fn header_omits_missing_metadata() {
        let ctx = format_context(&[passage("notes.pdf", None, None, "Some text.")]);
        assert_eq!(ctx, "[Source 1] notes.pdf\nSome text.\n");
    }

    #[test]
    fn blocks_are_numbered_and_divided() {
        let ctx = format_context(&[
            passage("A", None, None, "first"),
            passage("B", Some(2), None, "second"),
        ]);
        assert_eq!(
            ctx,
            "[Source 1] A\nfirst\n\n---\n[Source 2] B, Page 2\nsecond\n"
        );
    }
}
