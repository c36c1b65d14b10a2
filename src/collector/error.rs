use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("The snapshot lock was poisoned by a panicking writer")]
    Poisoned,
}
