pub mod journal;
pub mod weekly;

/// Soft outcome for the on-demand builders: too little history is a
/// structured result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome<T> {
    Built(T),
    InsufficientData { have: usize, need: usize },
}

impl<T> BuildOutcome<T> {
    pub fn built(self) -> Option<T> {
        match self {
            BuildOutcome::Built(value) => Some(value),
            BuildOutcome::InsufficientData { .. } => None,
        }
    }
}
