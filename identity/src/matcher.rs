use serde::{Deserialize, Serialize};

use crate::IdentityError;
use crate::matrix::l2_norm;
use crate::record::IdentityRecord;
use crate::snapshot::Snapshot;

/// Result of a nearest-neighbor scan.
///
/// `score` is always the best similarity seen, even when nothing cleared
/// the threshold, so callers can show the closest candidate's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch<'a> {
    pub record: Option<&'a IdentityRecord>,
    pub index: Option<usize>,
    pub score: f32,
}

impl<'a> BestMatch<'a> {
    fn none(score: f32) -> Self {
        Self {
            record: None,
            index: None,
            score,
        }
    }

    pub fn is_match(&self) -> bool {
        self.record.is_some()
    }
}

/// Cosine similarity of `probe` against every roster row.
///
/// Computed as one matrix-vector product scaled by the precomputed row
/// norms. Rows with a zero norm score 0. Returns an empty vector for an
/// empty snapshot or a zero probe.
pub fn similarities(probe: &[f32], snapshot: &Snapshot) -> Result<Vec<f32>, IdentityError> {
    if snapshot.is_empty() {
        return Ok(Vec::new());
    }
    let probe_norm = probe_norm(probe)?;
    if probe_norm == 0.0 {
        return Ok(Vec::new());
    }
    let dots = snapshot.matrix().mul_vec(probe)?;
    let p = probe_norm as f64;
    Ok(dots
        .iter()
        .zip(snapshot.norms())
        .map(|(&d, &n)| {
            if n == 0.0 {
                return 0.0;
            }
            (d / (n as f64 * p)).clamp(-1.0, 1.0) as f32
        })
        .collect())
}

/// Finds the roster entry most similar to `probe`.
///
/// Returns `(None, 0.0)` for an empty snapshot or a zero probe. Otherwise
/// the arg-max row is returned if its score is `>= threshold`, else
/// `(None, max)`. Ties go to the lowest row index.
pub fn find_best_match<'a>(
    probe: &[f32],
    snapshot: &'a Snapshot,
    threshold: f32,
) -> Result<BestMatch<'a>, IdentityError> {
    let sims = similarities(probe, snapshot)?;
    let Some((idx, best)) = argmax(&sims) else {
        return Ok(BestMatch::none(0.0));
    };
    if best >= threshold {
        return Ok(BestMatch {
            record: snapshot.get(idx),
            index: Some(idx),
            score: best,
        });
    }
    Ok(BestMatch::none(best))
}

fn probe_norm(probe: &[f32]) -> Result<f32, IdentityError> {
    if probe.iter().any(|v| !v.is_finite()) {
        return Err(IdentityError::NonFiniteProbe);
    }
    Ok(l2_norm(probe))
}

/// First index holding the maximum value.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut iter = values.iter().copied().enumerate();
    let first = iter.next()?;
    Some(iter.fold(first, |best, cur| if cur.1 > best.1 { cur } else { best }))
}

/// Which decision a match feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Strict: a match blocks re-registration of a known identity.
    Duplicate,
    /// Loose: a match recognizes a known identity during live operation.
    Identify,
}

/// Similarity cutoffs for each [`MatchPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_duplicate")]
    pub duplicate: f32,
    #[serde(default = "default_identify")]
    pub identify: f32,
}

pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.40;
pub const DEFAULT_IDENTIFY_THRESHOLD: f32 = 0.35;

fn default_duplicate() -> f32 {
    DEFAULT_DUPLICATE_THRESHOLD
}

fn default_identify() -> f32 {
    DEFAULT_IDENTIFY_THRESHOLD
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            duplicate: DEFAULT_DUPLICATE_THRESHOLD,
            identify: DEFAULT_IDENTIFY_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn for_policy(&self, policy: MatchPolicy) -> f32 {
        match policy {
            MatchPolicy::Duplicate => self.duplicate,
            MatchPolicy::Identify => self.identify,
        }
    }
}

/// Applies [`find_best_match`] with the threshold of a given policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityMatcher {
    thresholds: Thresholds,
}

impl SimilarityMatcher {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn find<'a>(
        &self,
        policy: MatchPolicy,
        probe: &[f32],
        snapshot: &'a Snapshot,
    ) -> Result<BestMatch<'a>, IdentityError> {
        find_best_match(probe, snapshot, self.thresholds.for_policy(policy))
    }

    /// Strict-threshold match against the roster.
    pub fn check_duplicate<'a>(
        &self,
        probe: &[f32],
        snapshot: &'a Snapshot,
    ) -> Result<BestMatch<'a>, IdentityError> {
        self.find(MatchPolicy::Duplicate, probe, snapshot)
    }

    /// Loose-threshold match against the roster.
    pub fn identify<'a>(
        &self,
        probe: &[f32],
        snapshot: &'a Snapshot,
    ) -> Result<BestMatch<'a>, IdentityError> {
        self.find(MatchPolicy::Identify, probe, snapshot)
    }
}
