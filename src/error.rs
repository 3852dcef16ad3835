use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MealMapError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid identifier for {field}: {value:?} is not a number")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Meal data rejected ({processed} of {expected} days): {message}")]
    MealDataRejected {
        processed: usize,
        expected: usize,
        message: String,
    },

    #[error("SIISP data rejected ({processed} of {expected} days): {message}")]
    SiispDataRejected {
        processed: usize,
        expected: usize,
        message: String,
    },

    #[error("Manual entry rejected: {0}")]
    ManualEntryRejected(String),

    #[error("No record for unit '{unit_name}' in {month:02}/{year} (lot {lot_id})")]
    RecordNotFound {
        lot_id: u32,
        unit_name: String,
        month: u32,
        year: i32,
    },

    #[error("Lot {0} not found")]
    LotNotFound(u32),

    #[error("Record set was modified concurrently: expected revision {expected}, store is at {found}")]
    ConcurrentModification { expected: u64, found: u64 },

    #[error("Could not save records: {0}")]
    PersistenceFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MealMapError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    MealData,
    SiispData,
}

/// Structured rejection handed back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub processed: usize,
    pub expected: usize,
    pub message: String,
}

impl MealMapError {
    /// Projects a data rejection into its wire shape. Other errors have none.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::MealDataRejected {
                processed,
                expected,
                message,
            } => Some(Rejection {
                kind: RejectionKind::MealData,
                processed: *processed,
                expected: *expected,
                message: message.clone(),
            }),
            Self::SiispDataRejected {
                processed,
                expected,
                message,
            } => Some(Rejection {
                kind: RejectionKind::SiispData,
                processed: *processed,
                expected: *expected,
                message: message.clone(),
            }),
            _ => None,
        }
    }
}
