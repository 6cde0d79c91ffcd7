use super::settings::SimilarityThresholds;
use super::structure::Structure;
use serde::{Deserialize, Serialize};

/// Every structure accepted during a search, kept by value.
///
/// Membership is approximate equality and therefore cannot be hashed; it is a
/// plain linear scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blacklist {
    entries: Vec<Structure>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, structure: Structure) {
        self.entries.push(structure);
    }

    pub fn contains(&self, candidate: &Structure, thresholds: &SimilarityThresholds, chiral: bool) -> bool {
        self.entries
            .iter()
            .any(|entry| candidate.is_similar(entry, thresholds, chiral))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conformer::molecule::tests::pentane_molecule;
    use crate::core::conformer::settings::MutationConfig;
    use crate::core::conformer::structure::tests::AcceptAll;
    use crate::core::dof::{Dof, DofKind};
    use crate::core::models::geometry::Geometry;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn membership_is_approximate() {
        let molecule = pentane_molecule(&[DofKind::Torsion]);
        let mut rng = StdRng::seed_from_u64(31);
        let mut structure = molecule.new_structure();
        structure
            .generate_structure(&molecule, &MutationConfig::default(), &AcceptAll, &mut rng)
            .unwrap();

        let thresholds = SimilarityThresholds::default();
        let mut blacklist = Blacklist::new();
        assert!(!blacklist.contains(&structure, &thresholds, true));
        structure.send_to_blacklist(&mut blacklist);
        assert_eq!(blacklist.len(), 1);

        let mut close = structure.clone();
        let values: Vec<f64> = close.dofs[0].values().iter().map(|v| v + 1.0).collect();
        close.dofs[0].set_values(values);
        assert!(blacklist.contains(&close, &thresholds, true));

        let mut distant = structure.clone();
        let values: Vec<f64> = distant.dofs[0].values().iter().map(|v| v + 120.0).collect();
        distant.dofs[0].set_values(values);
        assert!(!blacklist.contains(&distant, &thresholds, true));
    }

    fn dof(kind: DofKind, sites: usize, values: Vec<f64>) -> Dof {
        let positions = (0..sites).map(|i| vec![i; kind.tuple_len().unwrap_or(1)]).collect();
        let mut dof = Dof::new(kind, positions);
        dof.set_values(values);
        dof
    }

    fn mixed_structure(orientation: [f64; 4], puckers: [f64; 6], protons: [f64; 2]) -> Structure {
        Structure::new(
            vec![
                dof(DofKind::Torsion, 2, vec![60.0, -120.0]),
                dof(DofKind::Orientation, 0, orientation.to_vec()),
                dof(DofKind::PyranoseRing, 6, puckers.to_vec()),
                dof(DofKind::Protomeric, 2, protons.to_vec()),
            ],
            Geometry::default(),
        )
    }

    #[test]
    fn small_changes_on_every_kind_are_duplicates() {
        let thresholds = SimilarityThresholds::default();
        let mut blacklist = Blacklist::new();
        mixed_structure([90.0, 1.0, 0.0, 0.0], [0.0, 1.0, 2.0, 3.0, 4.0, 5.0], [1.0, 0.0])
            .send_to_blacklist(&mut blacklist);

        let mut nearby =
            mixed_structure([180.0, 1.0, 0.5, 0.0], [0.0, 1.0, 2.0, 3.0, 4.0, 7.0], [1.0, 0.0]);
        nearby.dofs[0].set_values(vec![61.0, -118.0]);
        assert!(blacklist.contains(&nearby, &thresholds, true));

        let tilted =
            mixed_structure([90.0, 0.0, 1.0, 0.0], [0.0, 1.0, 2.0, 3.0, 4.0, 5.0], [1.0, 0.0]);
        assert!(!blacklist.contains(&tilted, &thresholds, true));

        let repuckered =
            mixed_structure([90.0, 1.0, 0.0, 0.0], [9.0, 1.0, 2.0, 3.0, 4.0, 8.0], [1.0, 0.0]);
        assert!(!blacklist.contains(&repuckered, &thresholds, true));

        let deprotonated =
            mixed_structure([90.0, 1.0, 0.0, 0.0], [0.0, 1.0, 2.0, 3.0, 4.0, 5.0], [1.0, 1.0]);
        assert!(!blacklist.contains(&deprotonated, &thresholds, true));
    }
}
