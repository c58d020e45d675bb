// Pose comparison - similarity between a reference pose and a live pose

use crate::models::pose::{JointName, PoseError, PoseMatch, PoseResult, PoseSnapshot};
use std::collections::BTreeSet;

/// Average joint distance at which similarity reaches zero
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Tolerance used by the first generation of the comparator
pub const LEGACY_TOLERANCE: f64 = 0.2;

/// Scores two snapshots by the mean Euclidean distance of their shared joints.
///
/// `similarity = max(0, 1 - avg_distance / tolerance)`, over the joints both
/// snapshots contain (optionally restricted to a fixed list). The matched set
/// is an intersection, so the score does not depend on argument order.
#[derive(Debug, Clone)]
pub struct PoseComparator {
    tolerance: f64,
    restrict_to: Option<BTreeSet<JointName>>,
}

impl Default for PoseComparator {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            restrict_to: None,
        }
    }
}

impl PoseComparator {
    pub fn new(tolerance: f64) -> PoseResult<Self> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(PoseError::InvalidConfig(format!(
                "Comparison tolerance must be a positive number, got {}",
                tolerance
            )));
        }

        Ok(Self {
            tolerance,
            restrict_to: None,
        })
    }

    /// Only compare the listed joints
    pub fn restricted_to(mut self, joints: impl IntoIterator<Item = JointName>) -> Self {
        self.restrict_to = Some(joints.into_iter().collect());
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Similarity in `[0.0, 1.0]`. No shared joints gives 0.0.
    pub fn compare(&self, reference: &PoseSnapshot, current: &PoseSnapshot) -> f64 {
        self.compare_detailed(reference, current).similarity
    }

    pub fn compare_detailed(&self, reference: &PoseSnapshot, current: &PoseSnapshot) -> PoseMatch {
        // Walk the smaller map and probe the larger one
        let (small, large) = if reference.joints.len() <= current.joints.len() {
            (&reference.joints, &current.joints)
        } else {
            (&current.joints, &reference.joints)
        };

        let mut total_distance = 0.0;
        let mut matched = 0usize;

        for (name, joint) in small {
            if let Some(allowed) = &self.restrict_to {
                if !allowed.contains(name) {
                    continue;
                }
            }

            let other = match large.get(name) {
                Some(other) => other,
                None => continue,
            };

            let distance = joint.distance(other);
            if !distance.is_finite() {
                continue;
            }

            total_distance += distance;
            matched += 1;
        }

        if matched == 0 {
            return PoseMatch::no_overlap();
        }

        let average_distance = total_distance / matched as f64;
        let similarity = (1.0 - average_distance / self.tolerance).clamp(0.0, 1.0);

        PoseMatch {
            similarity: if similarity.is_finite() { similarity } else { 0.0 },
            matched_joints: matched,
            average_distance: Some(average_distance),
        }
    }
}
