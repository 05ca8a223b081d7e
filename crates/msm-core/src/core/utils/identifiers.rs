use phf::{Set, phf_set};

static AMINO_ACID_RESIDUE_NAMES: Set<&'static str> = phf_set! {
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE",
    "LEU", "LYS", "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
    // Protonation and naming variants written by common force fields.
    "HID", "HIE", "HIP", "HSD", "HSE", "HSP", "CYX", "CYM", "ASH", "GLH", "LYN",
    "NALA", "CALA", "NGLY", "CGLY", "NLE", "MSE", "SEP", "TPO", "PTR",
};

pub fn is_amino_acid(residue_name: &str) -> bool {
    AMINO_ACID_RESIDUE_NAMES.contains(residue_name.trim().to_ascii_uppercase().as_str())
}
