/// Fediverse instance identifiers and their normalization.
pub mod instance;
