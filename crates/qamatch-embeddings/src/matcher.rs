//! Best-candidate selection by cosine similarity.
//!
//! Pure and stateless. Candidates whose vector is malformed, of the wrong
//! dimension, or that score non-finite are skipped, never fatal.

use qamatch_store::RecordId;
use tracing::debug;

use crate::normalize::cosine_similarity;
use crate::vector::Vector;

/// One scoring candidate.
#[derive(Clone, Debug)]
pub struct Candidate<P> {
    /// Record identifier.
    pub id: RecordId,
    /// Decoded stored vector.
    pub vector: Vector,
    /// Data carried through to the match.
    pub payload: P,
}

/// The winning candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct Match<P> {
    /// Record identifier.
    pub id: RecordId,
    /// Payload of the winning candidate.
    pub payload: P,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
}

/// Return the candidate most similar to `query`, or `None` if no candidate
/// is usable.
///
/// Selection is a strict maximum: on equal scores the earliest candidate in
/// iteration order wins.
pub fn best_match<P, I>(query: &[f32], candidates: I) -> Option<Match<P>>
where
    I: IntoIterator<Item = Candidate<P>>,
{
    let mut best: Option<Match<P>> = None;

    for candidate in candidates {
        let Vector::Valid(ref values) = candidate.vector else {
            debug!(id = candidate.id, "skipping candidate without usable vector");
            continue;
        };
        let Some(score) = cosine_similarity(query, values) else {
            debug!(
                id = candidate.id,
                expected = query.len(),
                actual = values.len(),
                "skipping candidate with mismatched dimension"
            );
            continue;
        };
        if !score.is_finite() {
            debug!(id = candidate.id, "skipping candidate with non-finite score");
            continue;
        }
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(Match {
                id: candidate.id,
                payload: candidate.payload,
                score,
            });
        }
    }

    best
}
