pub mod identifiers;
pub mod linalg;
