use crate::chunking::TextChunk;
use std::collections::BTreeSet;

/// Weight of an original query keyword relative to an expanded one
const ORIGINAL_KEYWORD_WEIGHT: usize = 3;
/// Chunks before this position receive a bonus of `POSITION_BONUS_SPAN - position`
const POSITION_BONUS_SPAN: usize = 10;
/// How many leading chunks to return when nothing matches
const FALLBACK_CHUNKS: usize = 3;

/// A chunk paired with its relevance score for a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScoredChunk<'a> {
    pub chunk: &'a TextChunk,
    pub score: usize,
}

/// Bonus for chunks near the start of a contract, where definitions and parties live
pub fn position_bonus(position: usize) -> usize {
    POSITION_BONUS_SPAN.saturating_sub(position)
}

/// Keyword part of the score: 3 per original keyword occurrence plus 1 per
/// expanded keyword occurrence. `chunk` must already be lower-cased.
fn keyword_score(chunk: &str, keywords: &[String], expanded: &BTreeSet<String>) -> usize {
    let occurrences = |keyword: &str| chunk.matches(keyword).count();

    let original: usize = keywords
        .iter()
        .map(|keyword| occurrences(keyword) * ORIGINAL_KEYWORD_WEIGHT)
        .sum();
    let related: usize = expanded.iter().map(|keyword| occurrences(keyword)).sum();

    original + related
}

/// Full score of one chunk: keyword occurrences plus the position bonus
pub fn score_chunk(
    chunk: &str,
    position: usize,
    keywords: &[String],
    expanded: &BTreeSet<String>,
) -> usize {
    keyword_score(&chunk.to_lowercase(), keywords, expanded) + position_bonus(position)
}

/// Rank a document's chunks for a query and return the best `limit` texts.
///
/// Chunks scoring above zero are ordered by [`score_chunk`], ties keeping
/// document order. The position bonus alone is enough to compete, so leading
/// chunks are returned even without keyword hits. When nothing scores, the
/// first `min(3, chunks.len())` chunks are returned instead.
pub fn rank_chunks(
    chunks: &[TextChunk],
    keywords: &[String],
    expanded: &BTreeSet<String>,
    limit: usize,
) -> Vec<String> {
    let mut scored: Vec<ScoredChunk<'_>> = chunks
        .iter()
        .map(|chunk| ScoredChunk {
            chunk,
            score: score_chunk(&chunk.text, chunk.position, keywords, expanded),
        })
        .filter(|scored| scored.score > 0)
        .collect();

    if scored.is_empty() {
        return fallback(chunks);
    }

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));

    scored
        .into_iter()
        .take(limit)
        .map(|scored| scored.chunk.text.clone())
        .collect()
}

fn fallback(chunks: &[TextChunk]) -> Vec<String> {
    chunks
        .iter()
        .take(FALLBACK_CHUNKS)
        .map(|chunk| chunk.text.clone())
        .collect()
}
