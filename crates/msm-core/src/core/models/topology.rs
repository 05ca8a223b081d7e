use crate::core::utils::identifiers::is_amino_acid;

const ALPHA_CARBON_ATOM_NAME: &str = "CA";

/// Identity of a single atom as read from a structure file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomRecord {
    /// The atom name (e.g., "CA", "N", "OW").
    pub name: String,
    /// The three-letter residue name (e.g., "TRP").
    pub residue_name: String,
    /// The residue sequence number as written in the file.
    pub residue_number: isize,
}

impl AtomRecord {
    pub fn new(name: &str, residue_name: &str, residue_number: isize) -> Self {
        Self {
            name: name.trim().to_string(),
            residue_name: residue_name.trim().to_string(),
            residue_number,
        }
    }

    /// Returns `true` for the alpha carbon of a standard amino-acid residue.
    pub fn is_alpha_carbon(&self) -> bool {
        self.name == ALPHA_CARBON_ATOM_NAME && is_amino_acid(&self.residue_name)
    }
}

/// Atom-level description of a molecular system, in file order.
///
/// The topology carries no coordinates; those live in [`super::trajectory::Frame`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    atoms: Vec<AtomRecord>,
}

impl Topology {
    pub fn new(atoms: Vec<AtomRecord>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[AtomRecord] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&AtomRecord> {
        self.atoms.get(index)
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Indices of all protein alpha-carbon atoms, in file order.
    pub fn alpha_carbon_indices(&self) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, atom)| atom.is_alpha_carbon())
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tripeptide_with_water() -> Topology {
        Topology::new(vec![
            AtomRecord::new("N", "ALA", 1),
            AtomRecord::new("CA", "ALA", 1),
            AtomRecord::new("C", "ALA", 1),
            AtomRecord::new("N", "GLY", 2),
            AtomRecord::new(" CA ", "GLY", 2),
            AtomRecord::new("CA", "CA", 3),
            AtomRecord::new("OW", "SOL", 4),
            AtomRecord::new("CA", "TRP", 5),
        ])
    }

    #[test]
    fn alpha_carbon_indices_skip_non_protein_atoms() {
        let topology = tripeptide_with_water();
        assert_eq!(topology.alpha_carbon_indices(), vec![1, 4, 7]);
    }

    #[test]
    fn atom_record_new_trims_whitespace() {
        let atom = AtomRecord::new("  CB ", " LYS", 12);
        assert_eq!(atom.name, "CB");
        assert_eq!(atom.residue_name, "LYS");
        assert!(!atom.is_alpha_carbon());
    }

    #[test]
    fn atom_lookup_is_bounds_checked() {
        let topology = tripeptide_with_water();
        assert_eq!(topology.n_atoms(), 8);
        assert!(topology.atom(7).is_some());
        assert!(topology.atom(8).is_none());
    }
}
