use super::blacklist::Blacklist;
use super::molecule::Molecule;
use super::settings::{MutationConfig, SimilarityThresholds};
use super::validation::GeometryValidator;
use crate::core::dof::{Dof, DofError, DofKind};
use crate::core::models::geometry::{BoundingBox, Geometry};
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{instrument, trace};

/// Step of the upward translation used to escape a clash, in angstroms.
const LIFT_STEP: f64 = 0.5;
const MAX_LIFT_STEPS: usize = 200;

/// One candidate conformer.
///
/// The geometry is always derived from the template by applying the DOFs in
/// declared order, followed by the rigid `offset` left by
/// [`adjust_position`](Self::adjust_position).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    /// Assigned once the structure is accepted into a run.
    pub index: Option<usize>,
    pub dofs: Vec<Dof>,
    pub geometry: Geometry,
    /// Geometry before the last external relaxation.
    #[serde(default)]
    pub initial_geometry: Option<Geometry>,
    pub energy: Option<f64>,
    #[serde(default)]
    pub offset: Option<Vector3<f64>>,
}

impl Structure {
    pub fn new(dofs: Vec<Dof>, geometry: Geometry) -> Self {
        Self {
            index: None,
            dofs,
            geometry,
            initial_geometry: None,
            energy: None,
            offset: None,
        }
    }

    /// Stable name handed to the energy evaluator.
    pub fn name(&self) -> String {
        match self.index {
            Some(index) => format!("structure_{index}"),
            None => "structure_unassigned".to_string(),
        }
    }

    pub fn has_dof(&self, kind: DofKind) -> bool {
        self.dofs.iter().any(|d| d.kind() == kind)
    }

    /// Re-derives the geometry from the template and the current DOF values.
    pub fn rebuild_geometry(&mut self, template: &Geometry) -> Result<(), DofError> {
        let mut geometry = template.clone();
        for dof in &self.dofs {
            geometry = dof.apply_on(&geometry)?;
        }
        if let Some(offset) = &self.offset {
            geometry.translate(offset);
        }
        self.geometry = geometry;
        Ok(())
    }

    /// Draws fresh values for every DOF and rebuilds the geometry.
    ///
    /// Returns whether the resulting geometry is valid.
    #[instrument(level = "trace", skip_all)]
    pub fn generate_structure<R: Rng + ?Sized>(
        &mut self,
        molecule: &Molecule,
        mutation: &MutationConfig,
        validator: &dyn GeometryValidator,
        rng: &mut R,
    ) -> Result<bool, DofError> {
        self.offset = None;
        for dof in &mut self.dofs {
            match mutation.for_kind(dof.kind()).weights {
                Some(weights) => dof.get_weighted_values(&weights, rng),
                None => dof.get_random_values(rng),
            }
        }
        self.rebuild_geometry(&molecule.template)?;
        Ok(self.is_geometry_valid(validator))
    }

    pub fn is_geometry_valid(&self, validator: &dyn GeometryValidator) -> bool {
        validator.is_valid(&self.geometry)
    }

    pub fn is_geometry_valid_after_crossover(&self, validator: &dyn GeometryValidator) -> bool {
        validator.is_valid_after_crossover(&self.geometry)
    }

    /// Whether the structure overlaps the molecule's surroundings, if any.
    pub fn has_clash(&self, molecule: &Molecule, validator: &dyn GeometryValidator) -> bool {
        molecule
            .surroundings
            .as_ref()
            .is_some_and(|s| validator.has_clash(&self.geometry, s))
    }

    /// Whether the centroid lies inside `volume`.
    pub fn check_position(&self, volume: &BoundingBox) -> bool {
        volume.contains(&self.geometry.centroid())
    }

    /// Moves the whole structure back into the volume and upward along +z
    /// until it no longer clashes with the surroundings.
    ///
    /// Does nothing when the centroid is itself a degree of freedom.
    pub fn adjust_position(&mut self, molecule: &Molecule, validator: &dyn GeometryValidator) {
        if self.has_dof(DofKind::Centroid) {
            return;
        }

        let mut shift = Vector3::zeros();
        if let Some(volume) = &molecule.volume {
            let centroid = self.geometry.centroid();
            shift += volume.clamp(&centroid) - centroid;
            self.geometry.translate(&shift);
        }

        let lift = Vector3::new(0.0, 0.0, LIFT_STEP);
        let mut steps = 0;
        while steps < MAX_LIFT_STEPS && self.has_clash(molecule, validator) {
            self.geometry.translate(&lift);
            shift += lift;
            steps += 1;
        }

        if shift != Vector3::zeros() {
            trace!(?shift, steps, "Structure repositioned.");
            self.offset = Some(self.offset.unwrap_or_else(Vector3::zeros) + shift);
        }
    }

    /// Appends a copy of this structure to `blacklist`.
    pub fn send_to_blacklist(&self, blacklist: &mut Blacklist) {
        blacklist.push(self.clone());
    }

    /// Mutates each DOF with its configured probability and rebuilds the geometry.
    #[instrument(level = "trace", skip_all)]
    pub fn mutate<R: Rng + ?Sized>(
        &mut self,
        template: &Geometry,
        mutation: &MutationConfig,
        rng: &mut R,
    ) -> Result<(), DofError> {
        for dof in &mut self.dofs {
            let settings = mutation.for_kind(dof.kind());
            if rng.gen_bool(settings.probability.clamp(0.0, 1.0)) {
                dof.mutate_values(settings.max_mutations, settings.weights.as_deref(), rng);
            }
        }
        self.rebuild_geometry(template)
    }

    /// Mutates every DOF with every locus eligible and rebuilds the geometry.
    #[instrument(level = "trace", skip_all)]
    pub fn hard_mutate<R: Rng + ?Sized>(
        &mut self,
        template: &Geometry,
        mutation: &MutationConfig,
        rng: &mut R,
    ) -> Result<(), DofError> {
        for dof in &mut self.dofs {
            let settings = mutation.for_kind(dof.kind());
            let max = dof.value_count().max(1);
            dof.mutate_values(Some(max), settings.weights.as_deref(), rng);
        }
        self.rebuild_geometry(template)
    }

    /// Uniform crossover at DOF granularity.
    ///
    /// Each DOF slot goes to the first child from one parent and to the
    /// second child from the other, decided by a fair coin. Children carry
    /// no energy, index or lineage.
    pub fn crossover<R: Rng + ?Sized>(
        parent1: &Structure,
        parent2: &Structure,
        template: &Geometry,
        rng: &mut R,
    ) -> Result<(Structure, Structure), DofError> {
        let mut child1 = parent1.clone();
        let mut child2 = parent2.clone();
        child1.strip_lineage();
        child2.strip_lineage();

        for slot in 0..child1.dofs.len().min(child2.dofs.len()) {
            if rng.gen_bool(0.5) {
                std::mem::swap(&mut child1.dofs[slot], &mut child2.dofs[slot]);
            }
        }

        child1.rebuild_geometry(template)?;
        child2.rebuild_geometry(template)?;
        Ok((child1, child2))
    }

    /// Both structures agree on every DOF slot within the kind's threshold.
    pub fn is_similar(&self, other: &Structure, thresholds: &SimilarityThresholds, chiral: bool) -> bool {
        self.dofs.len() == other.dofs.len()
            && self
                .dofs
                .iter()
                .zip(&other.dofs)
                .all(|(a, b)| a.is_equal(b, thresholds.for_kind(a.kind()), chiral))
    }

    /// Ascending energy; structures without energy sort last.
    pub fn energy_ordering(a: &Structure, b: &Structure) -> Ordering {
        match (a.energy, b.energy) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Stores the outcome of an external relaxation.
    ///
    /// The pre-relaxation geometry and DOF values become lineage; the relaxed
    /// geometry is adopted and DOF values are measured back from it.
    pub fn record_evaluation(&mut self, energy: f64, relaxed: Geometry) -> Result<(), DofError> {
        self.initial_geometry = Some(std::mem::replace(&mut self.geometry, relaxed));
        for dof in &mut self.dofs {
            dof.record_initial_values();
            dof.update_values(&self.geometry)?;
        }
        self.energy = Some(energy);
        Ok(())
    }

    /// Drops energy, index and lineage so the structure is evaluated afresh.
    pub fn strip_lineage(&mut self) {
        self.index = None;
        self.energy = None;
        self.initial_geometry = None;
        for dof in &mut self.dofs {
            dof.clear_initial_values();
        }
    }
}
