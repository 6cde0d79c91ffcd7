use crate::core::dof::DofKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one kind of degree of freedom is mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationSettings {
    /// Probability that a regular mutation touches this DOF at all.
    pub probability: f64,
    /// Upper bound on mutated loci; `None` uses the DOF default.
    pub max_mutations: Option<usize>,
    /// Per-option weights for fresh draws; ignored unless they match the domain size.
    pub weights: Option<Vec<f64>>,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            probability: 0.8,
            max_mutations: None,
            weights: None,
        }
    }
}

/// Mutation settings per DOF kind; kinds without an entry use the defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationConfig {
    pub per_kind: BTreeMap<DofKind, MutationSettings>,
}

impl MutationConfig {
    pub fn for_kind(&self, kind: DofKind) -> MutationSettings {
        self.per_kind.get(&kind).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, kind: DofKind, settings: MutationSettings) {
        self.per_kind.insert(kind, settings);
    }
}

/// Thresholds below which two DOFs of the same kind count as equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    /// Normalized torsional RMS.
    pub torsion: f64,
    pub cis_trans: f64,
    /// Fraction of rings with a different pucker.
    pub pyranose_ring: f64,
    /// Angstroms.
    pub centroid: f64,
    /// Degrees between orientation axes.
    pub orientation: f64,
    pub protomeric: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            torsion: 0.2,
            cis_trans: 0.2,
            pyranose_ring: 0.2,
            centroid: 0.5,
            orientation: 45.0,
            protomeric: 0.0,
        }
    }
}

impl SimilarityThresholds {
    pub fn for_kind(&self, kind: DofKind) -> f64 {
        match kind {
            DofKind::Torsion => self.torsion,
            DofKind::CisTrans => self.cis_trans,
            DofKind::PyranoseRing => self.pyranose_ring,
            DofKind::Centroid => self.centroid,
            DofKind::Orientation => self.orientation,
            DofKind::Protomeric => self.protomeric,
        }
    }

    pub fn set(&mut self, kind: DofKind, threshold: f64) {
        let slot = match kind {
            DofKind::Torsion => &mut self.torsion,
            DofKind::CisTrans => &mut self.cis_trans,
            DofKind::PyranoseRing => &mut self.pyranose_ring,
            DofKind::Centroid => &mut self.centroid,
            DofKind::Orientation => &mut self.orientation,
            DofKind::Protomeric => &mut self.protomeric,
        };
        *slot = threshold;
    }
}
