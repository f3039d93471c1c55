//! MinHash signature computation and the Jaccard estimator.

use hashbrown::HashSet;
use rayon::prelude::*;

use crate::error::MinHashError;
use crate::family::HashFamily;

/// Fixed-length MinHash signature, one value per hash function.
pub type Signature = Vec<u64>;

/// Slot value of a signature computed over an empty shingle set.
pub const SENTINEL: u64 = u64::MAX;

/// Compute the MinHash signature of `shingles` under `family`.
///
/// Duplicate shingles do not change the result. An empty input yields a
/// signature of [`SENTINEL`] values.
pub fn compute_signature<S>(shingles: &[S], family: &HashFamily) -> Signature
where
    S: AsRef<str>,
{
    if shingles.is_empty() {
        return vec![SENTINEL; family.len()];
    }
    let mut signature = Vec::with_capacity(family.len());
    signature.extend((0..family.len()).map(|i| compute_slot(shingles, family, i)));
    signature
}

/// Same as [`compute_signature`] but computes slots on the rayon pool.
///
/// Produces a bit-identical signature.
pub fn compute_signature_parallel<S>(shingles: &[S], family: &HashFamily) -> Signature
where
    S: AsRef<str> + Sync,
{
    if shingles.is_empty() {
        return vec![SENTINEL; family.len()];
    }
    let mut signature = Vec::with_capacity(family.len());
    (0..family.len())
        .into_par_iter()
        .map(|i| compute_slot(shingles, family, i))
        .collect_into_vec(&mut signature);
    signature
}

#[inline]
fn compute_slot<S: AsRef<str>>(shingles: &[S], family: &HashFamily, i: usize) -> u64 {
    let mut minv = SENTINEL;
    for shingle in shingles {
        let h = family.hash(i, shingle.as_ref().as_bytes());
        if h < minv {
            minv = h;
        }
    }
    minv
}

/// Fraction of positions at which `a` and `b` agree.
///
/// Unbiased estimator of the Jaccard similarity of the underlying shingle
/// sets. Fails with [`MinHashError::DimensionMismatch`] if the lengths differ.
pub fn jaccard_estimate(a: &[u64], b: &[u64]) -> Result<f64, MinHashError> {
    if a.len() != b.len() {
        return Err(MinHashError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let agree = a.iter().zip(b).filter(|(x, y)| x == y).count();
    Ok(agree as f64 / a.len() as f64)
}

/// Exact Jaccard similarity `|A ∩ B| / |A ∪ B|` of two shingle collections.
///
/// Returns 0.0 when both are empty.
pub fn exact_jaccard<S>(a: &[S], b: &[S]) -> f64
where
    S: AsRef<str>,
{
    let left: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let right: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_has_family_length() {
        let family = HashFamily::new(100, 3);
        let sig = compute_signature(&["app", "ppl", "ple"], &family);
        assert_eq!(sig.len(), 100);
        assert!(sig.iter().all(|&v| v != SENTINEL));
    }

    #[test]
    fn signature_is_deterministic() {
        let family = HashFamily::new(64, 11);
        let shingles = ["whe", "hea", "eat", "at ", "t f", " fl", "flo", "lou", "our"];
        let first = compute_signature(&shingles, &family);
        for _ in 0..5 {
            assert_eq!(compute_signature(&shingles, &family), first);
        }
    }

    #[test]
    fn empty_shingles_give_sentinel_signature() {
        let family = HashFamily::new(16, 0);
        let empty: [&str; 0] = [];
        let sig = compute_signature(&empty, &family);
        assert_eq!(sig, vec![SENTINEL; 16]);
        assert_eq!(compute_signature_parallel(&empty, &family), sig);
    }

    #[test]
    fn duplicates_collapse() {
        let family = HashFamily::new(32, 8);
        let once = compute_signature(&["ric", "ice"], &family);
        let twice = compute_signature(&["ric", "ice", "ric", "ice", "ice"], &family);
        assert_eq!(once, twice);
    }

    #[test]
    fn order_is_irrelevant() {
        let family = HashFamily::new(32, 8);
        let a = compute_signature(&["egg", "ggs", "gs "], &family);
        let b = compute_signature(&["gs ", "egg", "ggs"], &family);
        assert_eq!(a, b);
    }

    #[test]
    fn parallel_equals_sequential() {
        let family = HashFamily::new(128, 21);
        let shingles: Vec<String> = (0..50).map(|i| format!("shingle-{i}")).collect();
        assert_eq!(
            compute_signature(&shingles, &family),
            compute_signature_parallel(&shingles, &family)
        );
    }

    #[test]
    fn estimate_requires_equal_lengths() {
        let err = jaccard_estimate(&[1, 2, 3], &[1, 2]).unwrap_err();
        assert_eq!(err, MinHashError::DimensionMismatch { left: 3, right: 2 });
    }

    #[test]
    fn estimate_counts_agreeing_positions() {
        let score = jaccard_estimate(&[1, 2, 3, 4], &[1, 9, 3, 9]).unwrap();
        assert!((score - 0.5).abs() < f64::EPSILON);
        assert_eq!(jaccard_estimate(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn identical_sets_estimate_one() {
        let family = HashFamily::new(50, 4);
        let a = compute_signature(&["x", "y", "z"], &family);
        let b = compute_signature(&["z", "y", "x"], &family);
        assert_eq!(jaccard_estimate(&a, &b).unwrap(), 1.0);
    }

    #[test]
    fn empty_signature_only_matches_empty() {
        let family = HashFamily::new(50, 4);
        let empty: [&str; 0] = [];
        let e1 = compute_signature(&empty, &family);
        let e2 = compute_signature(&empty, &family);
        let full = compute_signature(&["milk"], &family);
        assert_eq!(jaccard_estimate(&e1, &e2).unwrap(), 1.0);
        assert_eq!(jaccard_estimate(&e1, &full).unwrap(), 0.0);
    }

    #[test]
    fn estimate_converges_to_true_jaccard() {
        let a = ["a", "b", "c", "d"];
        let b = ["a", "b", "e", "f"];
        let truth = exact_jaccard(&a, &b);
        assert!((truth - 1.0 / 3.0).abs() < 1e-12);

        let trials = 100;
        let mut total = 0.0;
        for seed in 0..trials {
            let family = HashFamily::new(200, seed);
            let est = jaccard_estimate(
                &compute_signature(&a, &family),
                &compute_signature(&b, &family),
            )
            .unwrap();
            assert!(
                (0.20..=0.47).contains(&est),
                "seed {seed} produced estimate {est}"
            );
            total += est;
        }
        let mean = total / trials as f64;
        assert!((mean - truth).abs() < 0.03, "mean estimate {mean}");
    }

    #[test]
    fn estimate_tracks_random_sets() {
        let mut rng = fastrand::Rng::with_seed(42);
        for round in 0..20 {
            let shared: Vec<String> = (0..20).map(|i| format!("s{round}-{i}")).collect();
            let extra = rng.usize(1..20);
            let mut a = shared.clone();
            let mut b = shared;
            a.extend((0..extra).map(|i| format!("a{round}-{i}")));
            b.extend((0..extra).map(|i| format!("b{round}-{i}")));

            let truth = exact_jaccard(&a, &b);
            let family = HashFamily::new(400, round);
            let est = jaccard_estimate(
                &compute_signature(&a, &family),
                &compute_signature(&b, &family),
            )
            .unwrap();
            assert!((est - truth).abs() < 0.15, "truth {truth}, estimate {est}");
        }
    }

    #[test]
    fn exact_jaccard_handles_empty() {
        let empty: [&str; 0] = [];
        assert_eq!(exact_jaccard(&empty, &empty), 0.0);
        assert_eq!(exact_jaccard(&["a"], &["b"]), 0.0);
    }
}
