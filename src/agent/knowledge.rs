//! Per-agent knowledge base and the shared `search_knowledge_base` tool.
//!
//! Documents are embedded once on insert and held in memory. Search is a
//! two-stage retrieve-then-rerank: cosine similarity picks `2 × top_k`
//! candidates, then the embedding provider's rerank trims to `top_k`.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use super::provider::{EmbeddingPurpose, EmbeddingProvider, cosine_similarity};
use super::tool::{ParamSpec, ParameterSchema, Tool, ToolArgs};
use crate::error::{AgentError, ToolError};

/// Name of the knowledge search tool every domain agent carries.
pub const SEARCH_TOOL_NAME: &str = "search_knowledge_base";

/// Text returned when the store has nothing to offer.
pub const NO_RESULTS: &str = "No relevant documents found in the knowledge base.";

/// Characters of each hit shown to the model.
const EXCERPT_CHARS: usize = 500;

/// A document that can be supplied as context or stored for search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within a knowledge base.
    pub id: String,
    /// Document text.
    pub content: String,
    /// Free-form metadata (source, title, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Creates a document with no metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }
}

/// A search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Matching document.
    pub document: Document,
    /// Rerank relevance score.
    pub score: f32,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    embedding: Vec<f32>,
}

/// In-memory vector store backed by an embedding provider.
pub struct KnowledgeBase {
    embeddings: Arc<dyn EmbeddingProvider>,
    documents: RwLock<Vec<StoredDocument>>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase").finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    /// Creates an empty knowledge base.
    #[must_use]
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embeddings,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Embeds and stores documents. A document whose id is already present
    /// replaces the stored copy.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Embedding`] if embedding fails; nothing is
    /// stored in that case.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, AgentError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self
            .embeddings
            .embed(&texts, EmbeddingPurpose::Document)
            .await?;
        if vectors.len() != documents.len() {
            return Err(AgentError::Embedding {
                message: format!(
                    "expected {} embeddings, got {}",
                    documents.len(),
                    vectors.len()
                ),
            });
        }

        let added = documents.len();
        let mut store = self.documents.write().await;
        for (document, embedding) in documents.into_iter().zip(vectors) {
            store.retain(|s| s.document.id != document.id);
            store.push(StoredDocument {
                document,
                embedding,
            });
        }
        debug!(added, total = store.len(), "documents added to knowledge base");
        Ok(added)
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Retrieves and reranks documents for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Embedding`] if embedding or rerank fails.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, AgentError> {
        if top_k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embeddings
            .embed(&[query.to_string()], EmbeddingPurpose::Query)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let candidates: Vec<Document> = {
            let store = self.documents.read().await;
            let mut scored: Vec<(f32, &StoredDocument)> = store
                .iter()
                .map(|s| (cosine_similarity(&query_vec, &s.embedding), s))
                .collect();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored
                .into_iter()
                .take(top_k.saturating_mul(2))
                .map(|(_, s)| s.document.clone())
                .collect()
        };

        let texts: Vec<String> = candidates.iter().map(|d| d.content.clone()).collect();
        let ranked = self.embeddings.rerank(query, &texts, top_k).await?;
        Ok(ranked
            .into_iter()
            .filter_map(|r| {
                candidates.get(r.index).map(|d| SearchHit {
                    document: d.clone(),
                    score: r.relevance_score,
                })
            })
            .take(top_k)
            .collect())
    }
}

/// Renders search hits the way the model sees them.
#[must_use]
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let head: String = hit.document.content.chars().take(EXCERPT_CHARS).collect();
        let _ = write!(out, "[{}] (Score: {:.3})\n{head}...", i + 1, hit.score);
    }
    out
}

/// The `search_knowledge_base` tool bound to one agent's knowledge base.
#[derive(Debug)]
pub struct SearchKnowledgeTool {
    knowledge: Arc<KnowledgeBase>,
    schema: ParameterSchema,
}

impl SearchKnowledgeTool {
    /// Creates the tool over a knowledge base.
    #[must_use]
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            knowledge,
            schema: ParameterSchema::new()
                .required(ParamSpec::string("query", "The search query"))
                .optional(
                    ParamSpec::integer("top_k", "Number of results to return")
                        .with_default(json!(5)),
                ),
        }
    }
}

#[async_trait]
impl Tool for SearchKnowledgeTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the knowledge base for relevant information. Use this when you need to find specific facts or context."
    }

    fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        let query = args.str_or("query", "");
        let top_k = usize::try_from(args.i64_or("top_k", 5)).unwrap_or(5);
        let hits = self
            .knowledge
            .search(query, top_k)
            .await
            .map_err(|e| ToolError::Execution {
                name: SEARCH_TOOL_NAME.to_string(),
                message: e.to_string(),
            })?;
        Ok(format_hits(&hits))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::provider::RankedDocument;

    /// Embeds text as letter-frequency vectors; rerank by cosine.
    pub(crate) struct LetterEmbeddings;

    fn letters(text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; 26];
        for c in text.to_ascii_lowercase().bytes() {
            if c.is_ascii_lowercase() {
                v[usize::from(c - b'a')] += 1.0;
            }
        }
        v
    }

    #[async_trait]
    impl EmbeddingProvider for LetterEmbeddings {
        async fn embed(
            &self,
            texts: &[String],
            _purpose: EmbeddingPurpose,
        ) -> Result<Vec<Vec<f32>>, AgentError> {
            Ok(texts.iter().map(|t| letters(t)).collect())
        }

        async fn rerank(
            &self,
            query: &str,
            documents: &[String],
            top_n: usize,
        ) -> Result<Vec<RankedDocument>, AgentError> {
            let q = letters(query);
            let mut ranked: Vec<RankedDocument> = documents
                .iter()
                .enumerate()
                .map(|(index, d)| RankedDocument {
                    index,
                    relevance_score: cosine_similarity(&q, &letters(d)),
                })
                .collect();
            ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
            ranked.truncate(top_n);
            Ok(ranked)
        }
    }

    #[tokio::test]
    async fn test_empty_store_message() {
        let kb = Arc::new(KnowledgeBase::new(Arc::new(LetterEmbeddings)));
        let tool = SearchKnowledgeTool::new(kb);
        let out = tool
            .invoke(ToolArgs::from_map(
                json!({"query": "anything", "top_k": 3})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            ))
            .await;
        assert_eq!(out, Ok(NO_RESULTS.to_string()));
    }

    #[tokio::test]
    async fn test_search_ranks_best_match_first() {
        let kb = KnowledgeBase::new(Arc::new(LetterEmbeddings));
        let added = kb
            .add_documents(vec![
                Document::new("a", "zzzz zzzz"),
                Document::new("b", "portfolio risk"),
                Document::new("c", "xxxx"),
            ])
            .await
            .unwrap_or_default();
        assert_eq!(added, 3);

        let hits = kb.search("portfolio risk", 1).await.unwrap_or_default();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, "b");

        let text = format_hits(&hits);
        assert!(text.starts_with("[1] (Score: 1.000)\nportfolio risk..."));
    }

    #[tokio::test]
    async fn test_add_replaces_same_id() {
        let kb = KnowledgeBase::new(Arc::new(LetterEmbeddings));
        let _ = kb.add_documents(vec![Document::new("a", "one")]).await;
        let _ = kb.add_documents(vec![Document::new("a", "two")]).await;
        assert_eq!(kb.len().await, 1);
    }
}
