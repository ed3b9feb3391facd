use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::query::{tokenize, Query, SEARCH_RESULT_LIMIT};
use super::SearchIndex;
use crate::{
    errors::IndexError,
    models::{Mmsi, SearchResult},
};

struct Document {
    name: String,
    name_tokens: Vec<String>,
    mmsi_text: String,
}

/// In-process search index.
///
/// Holds no state that cannot be rebuilt from the position-updated topic.
#[derive(Default)]
pub struct MemorySearchIndex {
    documents: RwLock<BTreeMap<Mmsi, Document>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn index(&self, results: &[SearchResult]) -> Result<(), IndexError> {
        let mut documents = self.documents.write().await;
        for result in results {
            documents.insert(
                result.mmsi,
                Document {
                    name: result.name.clone(),
                    name_tokens: tokenize(&result.name),
                    mmsi_text: result.mmsi.to_string(),
                },
            );
        }
        debug!(count = results.len(), "Indexed ship search results");
        Ok(())
    }

    async fn search(&self, term: &str) -> Result<Vec<SearchResult>, IndexError> {
        let query = Query::parse(term);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let mut hits: Vec<(f64, Mmsi, &str)> = documents
            .iter()
            .filter_map(|(mmsi, doc)| {
                let score = query.score(&doc.name_tokens, &doc.mmsi_text);
                (score > 0.0).then_some((score, *mmsi, doc.name.as_str()))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        Ok(hits
            .into_iter()
            .take(SEARCH_RESULT_LIMIT)
            .map(|(_, mmsi, name)| SearchResult::new(mmsi, name))
            .collect())
    }
}
