//! Ship search projection
//!
//! Documents are `{mmsi, name}` pairs keyed by MMSI. A query is the union of
//! three clauses, scored and summed per document:
//!
//! 1. prefix-phrase on the name, for type-ahead ("AUGUST" finds "AUGUSTSON")
//! 2. fuzzy match on the name, for misspellings ("AUGUSTEN")
//! 3. fuzzy match on the MMSI as text, for mistyped identifiers
//!
//! Documents matching more clauses rank higher.

mod memory;
mod query;

use async_trait::async_trait;

use crate::{errors::IndexError, models::SearchResult};

pub use memory::MemorySearchIndex;
pub use query::{edit_distance, fuzziness, tokenize, SEARCH_RESULT_LIMIT};

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Upsert each result as a document keyed by MMSI.
    async fn index(&self, results: &[SearchResult]) -> Result<(), IndexError>;

    /// Ranked matches for `term`, best first. No match is an empty vector.
    async fn search(&self, term: &str) -> Result<Vec<SearchResult>, IndexError>;
}
