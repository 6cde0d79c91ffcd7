use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Represents a single atom of a molecular geometry.
///
/// Atoms are addressed by their index inside a [`Geometry`](super::geometry::Geometry),
/// and that index never changes during a search. Atoms that a protomer
/// degree of freedom removes are kept in place and flagged as `detached`,
/// so every other degree of freedom can keep using the same indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// The element symbol (e.g., "C", "O", "H").
    pub element: String,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// Whether the atom is currently removed from the molecule.
    #[serde(default)]
    pub detached: bool,
}

impl Atom {
    /// Creates a new attached `Atom` with the given element and position.
    ///
    /// # Arguments
    ///
    /// * `element` - The element symbol of the atom.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(element: &str, position: Point3<f64>) -> Self {
        Self {
            element: element.to_string(),
            position,
            detached: false,
        }
    }

    #[inline]
    pub fn is_hydrogen(&self) -> bool {
        self.element.eq_ignore_ascii_case("H")
            || self.element.eq_ignore_ascii_case("D")
            || self.element.eq_ignore_ascii_case("T")
    }

    #[inline]
    pub fn is_heavy(&self) -> bool {
        !self.is_hydrogen()
    }

    /// Returns `true` if the element symbol matches `symbol`, ignoring case.
    #[inline]
    pub fn is_element(&self, symbol: &str) -> bool {
        self.element.eq_ignore_ascii_case(symbol)
    }
}
