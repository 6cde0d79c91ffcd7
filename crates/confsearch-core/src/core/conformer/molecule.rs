use super::structure::Structure;
use crate::core::dof::{Centroid, Dof, DofError, DofKind, Orientation, check_atoms};
use crate::core::models::geometry::{BoundingBox, Geometry};
use crate::core::topology::locator::PatternLocator;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum MoleculeError {
    #[error("The template geometry has no atoms")]
    EmptyTemplate,
    #[error("Degree of freedom '{0}' was requested more than once")]
    DuplicateKind(DofKind),
    #[error("None of the requested degrees of freedom were found in the template")]
    NoDegreesOfFreedom,
    #[error(transparent)]
    Dof(#[from] DofError),
}

/// A degree of freedom the caller wants searched, with optional overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DofRequest {
    pub kind: DofKind,
    /// Explicit atom tuples; skips pattern discovery when set.
    #[serde(default)]
    pub positions: Option<Vec<Vec<usize>>>,
    /// Central bonds `(b, c)` that must not become torsions.
    #[serde(default)]
    pub excluded_bonds: Vec<(usize, usize)>,
    #[serde(default)]
    pub centroid_ranges: Option<[(i32, i32); 3]>,
    #[serde(default)]
    pub orientation_angles: Option<Vec<f64>>,
}

impl DofRequest {
    pub fn new(kind: DofKind) -> Self {
        Self {
            kind,
            positions: None,
            excluded_bonds: Vec::new(),
            centroid_ranges: None,
            orientation_angles: None,
        }
    }

    pub fn with_positions(mut self, positions: Vec<Vec<usize>>) -> Self {
        self.positions = Some(positions);
        self
    }

    fn build(&self, positions: Vec<Vec<usize>>) -> Dof {
        match self.kind {
            DofKind::Centroid => match self.centroid_ranges {
                Some(ranges) => Dof::Centroid(Centroid::with_ranges(positions, ranges)),
                None => Dof::new(DofKind::Centroid, positions),
            },
            DofKind::Orientation => match &self.orientation_angles {
                Some(angles) => Dof::Orientation(Orientation::with_angles(positions, angles.clone())),
                None => Dof::new(DofKind::Orientation, positions),
            },
            kind => Dof::new(kind, positions),
        }
    }
}

/// What is being searched: the template, its degrees of freedom and the
/// environment it lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub template: Geometry,
    /// Prototype DOFs in declared order; every structure starts from a copy.
    pub dofs: Vec<Dof>,
    /// Fixed atoms the molecule must not clash with.
    #[serde(default)]
    pub surroundings: Option<Geometry>,
    /// Region the centroid should stay in.
    #[serde(default)]
    pub volume: Option<BoundingBox>,
}

impl Molecule {
    /// Discovers the requested degrees of freedom on `template`.
    ///
    /// Kinds that match nothing in the template are skipped.
    pub fn new(
        template: Geometry,
        requests: &[DofRequest],
        locator: &dyn PatternLocator,
    ) -> Result<Self, MoleculeError> {
        if template.is_empty() {
            return Err(MoleculeError::EmptyTemplate);
        }

        let mut dofs: Vec<Dof> = Vec::with_capacity(requests.len());
        for request in requests {
            if dofs.iter().any(|d| d.kind() == request.kind) {
                return Err(MoleculeError::DuplicateKind(request.kind));
            }

            let mut positions = request
                .kind
                .find(&template, locator, request.positions.as_deref());
            check_atoms(request.kind, &positions, &template)?;
            if request.kind == DofKind::Torsion && !request.excluded_bonds.is_empty() {
                positions.retain(|p| {
                    !request
                        .excluded_bonds
                        .iter()
                        .any(|&(b, c)| (p[1] == b && p[2] == c) || (p[1] == c && p[2] == b))
                });
            }

            if positions.is_empty() {
                warn!(kind = %request.kind, "No sites found; degree of freedom skipped.");
                continue;
            }
            debug!(kind = %request.kind, loci = positions.len(), "Degree of freedom registered.");
            dofs.push(request.build(positions));
        }

        if dofs.is_empty() {
            return Err(MoleculeError::NoDegreesOfFreedom);
        }
        info!(
            atoms = template.len(),
            dofs = dofs.len(),
            "Molecule prepared for conformer search."
        );

        Ok(Self {
            template,
            dofs,
            surroundings: None,
            volume: None,
        })
    }

    pub fn with_surroundings(mut self, surroundings: Geometry) -> Self {
        self.surroundings = Some(surroundings);
        self
    }

    pub fn with_volume(mut self, volume: BoundingBox) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn has_dof(&self, kind: DofKind) -> bool {
        self.dofs.iter().any(|d| d.kind() == kind)
    }

    /// A blank structure: prototype DOFs without values on the template geometry.
    pub fn new_structure(&self) -> Structure {
        Structure::new(self.dofs.clone(), self.template.clone())
    }
}
