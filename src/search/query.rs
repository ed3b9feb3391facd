//! Text analysis and clause scoring.

/// Maximum number of results returned by a search
pub const SEARCH_RESULT_LIMIT: usize = 10;

// A matching clause scores 1 plus a bonus bounded by its band, so any two
// clauses outscore any single one. The prefix band sits above the fuzzy
// name band.
const PREFIX_PHRASE_BASE: f64 = 1.3;
const PREFIX_PHRASE_BAND: f64 = 0.2;
const FUZZY_NAME_BAND: f64 = 0.2;
const FUZZY_MMSI_BAND: f64 = 0.1;

/// Lowercase and split on anything that is not a letter or digit.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Allowed edits for a query token of `len` characters.
///
/// - 0..=2 characters: exact match only
/// - 3..=5 characters: one edit
/// - longer: two edits
pub fn fuzziness(len: usize) -> usize {
    match len {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Edit distance counting insertion, deletion, substitution and swap of two
/// adjacent characters as one edit each (optimal string alignment).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Three rolling rows: i-2, i-1, i
    let mut before_prev: Vec<usize> = vec![0; b.len() + 1];
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                curr[j] = curr[j].min(before_prev[j - 2] + 1);
            }
        }
        std::mem::swap(&mut before_prev, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity in (0, 1] of `token` to `candidate` when within the token's
/// fuzziness, `None` otherwise.
fn fuzzy_similarity(token: &str, candidate: &str) -> Option<f64> {
    let token_len = token.chars().count();
    let distance = edit_distance(token, candidate);
    if distance > fuzziness(token_len) {
        return None;
    }
    let longest = token_len.max(candidate.chars().count()).max(1);
    Some(1.0 - distance as f64 / (longest + 1) as f64)
}

/// Analyzed query, reused across documents
pub(crate) struct Query {
    tokens: Vec<String>,
}

impl Query {
    pub(crate) fn parse(term: &str) -> Self {
        Self {
            tokens: tokenize(term),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Summed score of all matching clauses; 0 means no clause matched.
    pub(crate) fn score(&self, name_tokens: &[String], mmsi_text: &str) -> f64 {
        self.prefix_phrase(name_tokens) + self.fuzzy_name(name_tokens) + self.fuzzy_mmsi(mmsi_text)
    }

    /// All query tokens appear consecutively in the name, the last one as
    /// a prefix. Scaled by how much of the name the query covers.
    fn prefix_phrase(&self, name_tokens: &[String]) -> f64 {
        let Some((last, leading)) = self.tokens.split_last() else {
            return 0.0;
        };
        if name_tokens.len() < self.tokens.len() {
            return 0.0;
        }

        let matched = name_tokens
            .windows(self.tokens.len())
            .any(|window| match window.split_last() {
                Some((window_last, window_leading)) => {
                    window_leading == leading && window_last.starts_with(last.as_str())
                }
                None => false,
            });
        if !matched {
            return 0.0;
        }

        let query_chars: usize = self.tokens.iter().map(|t| t.chars().count()).sum();
        let name_chars: usize = name_tokens.iter().map(|t| t.chars().count()).sum();
        let coverage = (query_chars as f64 / name_chars.max(1) as f64).min(1.0);
        PREFIX_PHRASE_BASE + PREFIX_PHRASE_BAND * coverage
    }

    /// Each query token is compared with its closest name token; the clause
    /// matches when at least one query token is within its fuzziness.
    fn fuzzy_name(&self, name_tokens: &[String]) -> f64 {
        let similarities: Vec<f64> = self
            .tokens
            .iter()
            .filter_map(|token| {
                name_tokens
                    .iter()
                    .filter_map(|candidate| fuzzy_similarity(token, candidate))
                    .reduce(f64::max)
            })
            .collect();
        if similarities.is_empty() {
            return 0.0;
        }
        let mean = similarities.iter().sum::<f64>() / self.tokens.len().max(1) as f64;
        1.0 + FUZZY_NAME_BAND * mean
    }

    fn fuzzy_mmsi(&self, mmsi_text: &str) -> f64 {
        self.tokens
            .iter()
            .filter_map(|token| fuzzy_similarity(token, mmsi_text))
            .reduce(f64::max)
            .map_or(0.0, |similarity| 1.0 + FUZZY_MMSI_BAND * similarity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(tokenize("  Ever Given "), vec!["ever", "given"]);
        assert_eq!(tokenize("M/V NORD-STAR"), vec!["m", "v", "nord", "star"]);
        assert!(tokenize(" -- ").is_empty());
    }

    #[test]
    fn fuzziness_scales_with_length() {
        assert_eq!(fuzziness(1), 0);
        assert_eq!(fuzziness(2), 0);
        assert_eq!(fuzziness(3), 1);
        assert_eq!(fuzziness(5), 1);
        assert_eq!(fuzziness(6), 2);
        assert_eq!(fuzziness(9), 2);
    }

    #[test]
    fn edit_distance_cases() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("augustson", "augustson"), 0);
        assert_eq!(edit_distance("augusten", "augustson"), 2);
        assert_eq!(edit_distance("auguston", "augustson"), 1);
        assert_eq!(edit_distance("259000421", "259000420"), 1);
        // adjacent swap is a single edit
        assert_eq!(edit_distance("agusutson", "augustson"), 2);
        assert_eq!(edit_distance("uagustson", "augustson"), 1);
    }

    #[test]
    fn prefix_phrase_outranks_fuzzy_only() {
        let query = Query::parse("nord");
        let prefix = query.score(&tokenize("NORDIC STAR"), "1");
        let fuzzy = query.score(&tokenize("NARD"), "2");
        assert!(prefix > 0.0);
        assert!(fuzzy > 0.0);
        assert!(prefix > fuzzy);
    }

    #[test]
    fn two_clauses_outrank_any_single_clause() {
        let query = Query::parse("1234567");
        // prefix only
        let prefix = query.score(&tokenize("1234567890"), "9");
        // fuzzy name and fuzzy MMSI
        let fuzzy_pair = query.score(&tokenize("12345"), "1234569");
        assert!(prefix > 0.0);
        assert!(fuzzy_pair > prefix);
    }

    #[test]
    fn multi_token_prefix_phrase() {
        let query = Query::parse("ever gi");
        assert!(query.prefix_phrase(&tokenize("EVER GIVEN")) > 0.0);
        assert_eq!(query.prefix_phrase(&tokenize("GIVEN EVER")), 0.0);
    }

    #[test]
    fn unrelated_term_scores_zero() {
        let query = Query::parse("TITANIC");
        assert_eq!(query.score(&tokenize("AUGUSTSON"), "259000420"), 0.0);
    }
}
