use crate::backend::DocSet;
use crate::band::{band_fingerprint, band_ranges};
use crate::{IndexError, LshIndex};
use log::debug;
use minhash::jaccard_estimate;
use std::cmp::Ordering;

/// One scored query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    /// Identifier of the matched document.
    pub doc_id: String,
    /// Estimated Jaccard similarity to the query (0.0 to 1.0).
    pub score: f64,
}

/// Candidate retrieval and threshold filtering.
impl LshIndex {
    /// Union of the bucket members across every band of the query signature.
    ///
    /// No similarity filtering is applied, and members of inserts that have
    /// not committed yet are included.
    pub fn candidates<S: AsRef<str> + Sync>(&self, shingles: &[S]) -> Result<DocSet, IndexError> {
        let signature = self.signature(shingles);
        self.candidates_for(&signature)
    }

    /// Documents whose estimated similarity to `shingles` is at least `threshold`.
    ///
    /// An empty result is a valid outcome. Backend errors propagate.
    pub fn query<S: AsRef<str> + Sync>(
        &self,
        shingles: &[S],
        threshold: f64,
    ) -> Result<DocSet, IndexError> {
        Ok(self
            .query_scored(shingles, threshold)?
            .into_iter()
            .map(|hit| hit.doc_id)
            .collect())
    }

    /// Like [`LshIndex::query`] but keeps the scores, highest first.
    ///
    /// Ties are ordered by document id so the output is deterministic.
    pub fn query_scored<S: AsRef<str> + Sync>(
        &self,
        shingles: &[S],
        threshold: f64,
    ) -> Result<Vec<QueryHit>, IndexError> {
        let signature = self.signature(shingles);
        let candidates = self.candidates_for(&signature)?;

        let mut hits = Vec::with_capacity(candidates.len());
        for doc_id in candidates {
            // Bucket members without a signature are uncommitted inserts.
            let stored = match self.store.get_signature(&doc_id) {
                Ok(stored) => stored,
                Err(IndexError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            };
            let score = jaccard_estimate(&signature, &stored)?;
            if score >= threshold {
                hits.push(QueryHit { doc_id, score });
            }
        }
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        debug!(
            "lsh query kept {} hits at threshold {threshold}",
            hits.len()
        );
        Ok(hits)
    }

    fn candidates_for(&self, signature: &[u64]) -> Result<DocSet, IndexError> {
        let mut candidates = DocSet::new();
        for (band, range) in band_ranges(self.config.num_bands, self.config.band_size()) {
            let fingerprint = band_fingerprint(signature, range.start, range.end);
            candidates.extend(self.store.members_of(band, &fingerprint)?);
        }
        Ok(candidates)
    }
}
