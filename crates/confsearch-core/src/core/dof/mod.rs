//! # Degrees of Freedom
//!
//! The closed catalogue of structural variables a search can evolve. Every
//! variant carries a [`DofState`] (the atom tuples it controls and its current
//! values) and implements the uniform [`DegreeOfFreedom`] contract:
//!
//! - draw fresh values from its domain, uniformly or weighted
//! - mutate a bounded subset of its loci
//! - impose its values on a geometry, returning a new geometry
//! - measure its values back from a geometry
//! - compare itself to another instance of the same variant
//!
//! [`Dof`] is the tagged sum type the rest of the crate works with.

use crate::core::models::geometry::Geometry;
use crate::core::topology::locator::{PatternLocator, SitePattern};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod centroid;
pub mod cistrans;
pub mod orientation;
pub mod protomeric;
pub mod pyranose;
pub mod torsion;

pub use centroid::Centroid;
pub use cistrans::CisTrans;
pub use orientation::Orientation;
pub use protomeric::Protomeric;
pub use pyranose::PyranoseRing;
pub use torsion::Torsion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DofKind {
    Centroid,
    Orientation,
    Torsion,
    CisTrans,
    PyranoseRing,
    Protomeric,
}

impl DofKind {
    pub const ALL: [DofKind; 6] = [
        DofKind::Centroid,
        DofKind::Orientation,
        DofKind::Torsion,
        DofKind::CisTrans,
        DofKind::PyranoseRing,
        DofKind::Protomeric,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Centroid => "centroid",
            Self::Orientation => "orientation",
            Self::Torsion => "torsion",
            Self::CisTrans => "cis_trans",
            Self::PyranoseRing => "pyranose_ring",
            Self::Protomeric => "protomeric",
        }
    }

    /// Whether the value domain is an angle on a circle.
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Torsion | Self::CisTrans)
    }

    /// The pattern used to discover positions when none are given explicitly.
    pub fn site_pattern(self) -> SitePattern {
        match self {
            Self::Centroid | Self::Orientation => SitePattern::WholeMolecule,
            Self::Torsion => SitePattern::RotatableBond,
            Self::CisTrans => SitePattern::CisTransBond,
            Self::PyranoseRing => SitePattern::PyranoseRing,
            Self::Protomeric => SitePattern::MovableProton,
        }
    }

    /// Number of atom indices every position tuple must carry, if fixed.
    pub fn tuple_len(self) -> Option<usize> {
        match self {
            Self::Torsion | Self::CisTrans => Some(4),
            Self::PyranoseRing => Some(pyranose::SITE_LEN),
            Self::Protomeric => Some(2),
            Self::Centroid | Self::Orientation => None,
        }
    }

    /// Positions for this kind on `template`.
    ///
    /// Explicit positions win over discovery; a pattern absent from the
    /// template yields an empty list.
    pub fn find(
        self,
        template: &Geometry,
        locator: &dyn PatternLocator,
        explicit: Option<&[Vec<usize>]>,
    ) -> Vec<Vec<usize>> {
        match explicit {
            Some(positions) => positions.to_vec(),
            None => locator.find_positions(template, self.site_pattern()),
        }
    }
}

impl fmt::Display for DofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("Unknown degree of freedom kind: '{0}'")]
pub struct ParseDofKindError(pub String);

impl FromStr for DofKind {
    type Err = ParseDofKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "centroid" => Ok(Self::Centroid),
            "orientation" => Ok(Self::Orientation),
            "torsion" => Ok(Self::Torsion),
            "cis_trans" | "cistrans" => Ok(Self::CisTrans),
            "pyranose_ring" | "pyranosering" | "pyranose" => Ok(Self::PyranoseRing),
            "protomeric" | "protomer" => Ok(Self::Protomeric),
            _ => Err(ParseDofKindError(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DofError {
    #[error("{kind} expects {expected} values, got {found}")]
    ValueCount {
        kind: DofKind,
        expected: usize,
        found: usize,
    },
    #[error("{kind} position refers to atom {index}, but the geometry has {len} atoms")]
    AtomOutOfRange {
        kind: DofKind,
        index: usize,
        len: usize,
    },
    #[error("{kind} position {position:?} must list {expected} atoms")]
    MalformedPosition {
        kind: DofKind,
        position: Vec<usize>,
        expected: usize,
    },
    #[error("{kind} bond {b}-{c} is part of a ring and cannot be rotated")]
    RingBond { kind: DofKind, b: usize, c: usize },
    #[error("{kind} value {value} is outside its domain")]
    InvalidValue { kind: DofKind, value: f64 },
    #[error("{kind} cannot be applied to a degenerate geometry: {reason}")]
    DegenerateGeometry { kind: DofKind, reason: String },
}

impl DofError {
    /// Errors caused by the drawn values rather than by the setup; retry
    /// loops treat them like an invalid geometry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DegenerateGeometry { .. })
    }
}

/// State shared by every degree of freedom.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DofState {
    /// Atom index tuples this DOF controls. Never modified after discovery.
    pub positions: Vec<Vec<usize>>,
    pub values: Vec<f64>,
    /// Values before the last external relaxation, when one happened.
    #[serde(default)]
    pub initial_values: Option<Vec<f64>>,
}

impl DofState {
    pub fn new(positions: Vec<Vec<usize>>) -> Self {
        Self {
            positions,
            values: Vec::new(),
            initial_values: None,
        }
    }
}

/// The uniform contract of a degree of freedom.
pub trait DegreeOfFreedom {
    fn kind(&self) -> DofKind;
    fn state(&self) -> &DofState;
    fn state_mut(&mut self) -> &mut DofState;

    /// Number of values this DOF carries once initialized.
    fn value_count(&self) -> usize {
        self.state().positions.len()
    }

    fn positions(&self) -> &[Vec<usize>] {
        &self.state().positions
    }

    fn values(&self) -> &[f64] {
        &self.state().values
    }

    /// Draws a fresh value for every locus from the variant domain.
    fn get_random_values<R: Rng + ?Sized>(&mut self, rng: &mut R);

    /// Like [`get_random_values`](Self::get_random_values), but weighted when
    /// `weights` matches the size of the domain.
    fn get_weighted_values<R: Rng + ?Sized>(&mut self, weights: &[f64], rng: &mut R);

    /// Replaces a random subset of at most `max_mutations` loci.
    ///
    /// `None` uses the variant default, `max(1, ceil(n/2))`.
    fn mutate_values<R: Rng + ?Sized>(
        &mut self,
        max_mutations: Option<usize>,
        weights: Option<&[f64]>,
        rng: &mut R,
    );

    /// Returns a copy of `geometry` with this DOF's values imposed.
    fn apply_on(&self, geometry: &Geometry) -> Result<Geometry, DofError>;

    /// Measures the values of this DOF from `geometry`.
    fn update_values(&mut self, geometry: &Geometry) -> Result<(), DofError>;

    /// Variant distance between two value vectors of equal length.
    fn distance(&self, mine: &[f64], theirs: &[f64], chiral: bool) -> f64;

    /// Sets `values_to_set` (when given) and applies the DOF on `geometry`.
    fn apply_values(
        &mut self,
        geometry: &Geometry,
        values_to_set: Option<&[f64]>,
    ) -> Result<Geometry, DofError> {
        if let Some(values) = values_to_set {
            let expected = self.value_count();
            if values.len() != expected {
                return Err(DofError::ValueCount {
                    kind: self.kind(),
                    expected,
                    found: values.len(),
                });
            }
            self.state_mut().values = values.to_vec();
        }
        self.apply_on(geometry)
    }

    /// Approximate equality against another instance of the same variant.
    ///
    /// True iff the smallest distance over current-vs-current and
    /// current-vs-initial (when `other` has initial values) is within
    /// `threshold`.
    fn is_equal(&self, other: &Self, threshold: f64, chiral: bool) -> bool
    where
        Self: Sized,
    {
        let mine = self.values();
        let mut candidates: Vec<&[f64]> = vec![other.values()];
        if let Some(initial) = other.state().initial_values.as_deref() {
            candidates.push(initial);
        }
        candidates
            .into_iter()
            .filter(|theirs| theirs.len() == mine.len())
            .map(|theirs| self.distance(mine, theirs, chiral))
            .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.min(d))))
            .is_some_and(|d| d <= threshold)
    }
}

pub(crate) fn check_atoms(kind: DofKind, positions: &[Vec<usize>], geometry: &Geometry) -> Result<(), DofError> {
    for position in positions {
        if let Some(expected) = kind.tuple_len() {
            if position.len() != expected {
                return Err(DofError::MalformedPosition {
                    kind,
                    position: position.clone(),
                    expected,
                });
            }
        }
        if let Some(&index) = position.iter().find(|&&i| i >= geometry.len()) {
            return Err(DofError::AtomOutOfRange {
                kind,
                index,
                len: geometry.len(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_value_count(kind: DofKind, expected: usize, values: &[f64]) -> Result<(), DofError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(DofError::ValueCount {
            kind,
            expected,
            found: values.len(),
        })
    }
}

/// A degree of freedom of any variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dof {
    Centroid(Centroid),
    Orientation(Orientation),
    Torsion(Torsion),
    CisTrans(CisTrans),
    PyranoseRing(PyranoseRing),
    Protomeric(Protomeric),
}

macro_rules! dispatch {
    ($value:expr, $dof:ident => $body:expr) => {
        match $value {
            Dof::Centroid($dof) => $body,
            Dof::Orientation($dof) => $body,
            Dof::Torsion($dof) => $body,
            Dof::CisTrans($dof) => $body,
            Dof::PyranoseRing($dof) => $body,
            Dof::Protomeric($dof) => $body,
        }
    };
}

impl Dof {
    /// Creates a DOF of `kind` over `positions` with default domain settings.
    pub fn new(kind: DofKind, positions: Vec<Vec<usize>>) -> Self {
        match kind {
            DofKind::Centroid => Dof::Centroid(Centroid::new(positions)),
            DofKind::Orientation => Dof::Orientation(Orientation::new(positions)),
            DofKind::Torsion => Dof::Torsion(Torsion::new(positions)),
            DofKind::CisTrans => Dof::CisTrans(CisTrans::new(positions)),
            DofKind::PyranoseRing => Dof::PyranoseRing(PyranoseRing::new(positions)),
            DofKind::Protomeric => Dof::Protomeric(Protomeric::new(positions)),
        }
    }

    pub fn kind(&self) -> DofKind {
        dispatch!(self, d => d.kind())
    }

    pub fn state(&self) -> &DofState {
        dispatch!(self, d => d.state())
    }

    pub fn state_mut(&mut self) -> &mut DofState {
        dispatch!(self, d => d.state_mut())
    }

    pub fn positions(&self) -> &[Vec<usize>] {
        &self.state().positions
    }

    pub fn values(&self) -> &[f64] {
        &self.state().values
    }

    pub fn value_count(&self) -> usize {
        dispatch!(self, d => d.value_count())
    }

    pub fn get_random_values<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        dispatch!(self, d => d.get_random_values(rng))
    }

    pub fn get_weighted_values<R: Rng + ?Sized>(&mut self, weights: &[f64], rng: &mut R) {
        dispatch!(self, d => d.get_weighted_values(weights, rng))
    }

    pub fn mutate_values<R: Rng + ?Sized>(
        &mut self,
        max_mutations: Option<usize>,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) {
        dispatch!(self, d => d.mutate_values(max_mutations, weights, rng))
    }

    pub fn apply_on(&self, geometry: &Geometry) -> Result<Geometry, DofError> {
        dispatch!(self, d => d.apply_on(geometry))
    }

    pub fn apply_values(
        &mut self,
        geometry: &Geometry,
        values_to_set: Option<&[f64]>,
    ) -> Result<Geometry, DofError> {
        dispatch!(self, d => d.apply_values(geometry, values_to_set))
    }

    pub fn update_values(&mut self, geometry: &Geometry) -> Result<(), DofError> {
        dispatch!(self, d => d.update_values(geometry))
    }

    /// Approximate equality; DOFs of different variants are never equal.
    pub fn is_equal(&self, other: &Dof, threshold: f64, chiral: bool) -> bool {
        match (self, other) {
            (Dof::Centroid(a), Dof::Centroid(b)) => a.is_equal(b, threshold, chiral),
            (Dof::Orientation(a), Dof::Orientation(b)) => a.is_equal(b, threshold, chiral),
            (Dof::Torsion(a), Dof::Torsion(b)) => a.is_equal(b, threshold, chiral),
            (Dof::CisTrans(a), Dof::CisTrans(b)) => a.is_equal(b, threshold, chiral),
            (Dof::PyranoseRing(a), Dof::PyranoseRing(b)) => a.is_equal(b, threshold, chiral),
            (Dof::Protomeric(a), Dof::Protomeric(b)) => a.is_equal(b, threshold, chiral),
            _ => false,
        }
    }

    /// Replaces the current values by `values`, keeping everything else.
    pub fn set_values(&mut self, values: Vec<f64>) {
        self.state_mut().values = values;
    }

    /// Snapshots the current values as the pre-relaxation lineage.
    pub fn record_initial_values(&mut self) {
        let state = self.state_mut();
        state.initial_values = Some(state.values.clone());
    }

    pub fn clear_initial_values(&mut self) {
        self.state_mut().initial_values = None;
    }
}
