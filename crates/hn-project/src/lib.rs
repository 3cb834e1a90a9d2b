//! hn-project: persisted document format, migrations and the editing session.

pub mod convert;
pub mod io;
pub mod migrate;
pub mod schema;
pub mod session;

use hn_core::ElementId;
use hn_graph::{ElementKind, SchemaViolation};

pub use convert::{load, save};
pub use io::{DocumentFormat, SaveOptions, load_file, load_str, save_file, save_file_with, save_string};
pub use migrate::{CURRENT_FORMAT_VERSION, MIN_FORMAT_VERSION, migrate_to_current};
pub use schema::*;
pub use session::ModelSession;

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    /// Unreadable text, or a version this build cannot handle.
    #[error("Format error: {what}")]
    Format { what: String },

    /// Well-formed text whose structure is not a valid model.
    #[error("Corrupt document: {what}")]
    Corrupt { what: String },

    /// Stored parameters that no longer satisfy the current schema.
    #[error("Element {element} ({kind}): {violation}")]
    Schema {
        element: ElementId,
        kind: ElementKind,
        violation: SchemaViolation,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub(crate) fn format(what: impl Into<String>) -> Self {
        DocumentError::Format { what: what.into() }
    }

    pub(crate) fn corrupt(what: impl Into<String>) -> Self {
        DocumentError::Corrupt { what: what.into() }
    }
}
