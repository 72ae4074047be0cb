use thiserror::Error;

/// The input table lacks one or more of the columns every label needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("CSV file is missing required headers: {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<String>,
}
