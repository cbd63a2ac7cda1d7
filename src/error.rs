//! Error types for rendoc library.

use std::io;
use thiserror::Error;

use crate::engine::TemplateError;
use crate::pipeline::ValidationReport;

/// Result type alias for rendoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while rendering a template.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Template or record JSON could not be read.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A section failed to compile or evaluate.
    #[error("Section '{section_id}': {source}")]
    Section {
        /// Id of the offending section
        section_id: String,
        /// Underlying template error
        #[source]
        source: TemplateError,
    },

    /// The template failed structural validation.
    #[error("Invalid template: {}", .0.summary())]
    Invalid(ValidationReport),

    /// An emitter could not represent a document node.
    #[error("Emission error at {location}: {message}")]
    Emit {
        /// Section id and block position of the node
        location: String,
        /// What went wrong
        message: String,
    },

    /// The external page renderer failed.
    #[error("Page renderer error: {0}")]
    Renderer(String),

    /// Error writing the structured document package.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Error writing document XML.
    #[error("XML error: {0}")]
    Xml(String),
}

impl Error {
    /// Wrap a template error with the id of the section it came from.
    pub fn section(section_id: impl Into<String>, source: TemplateError) -> Self {
        Error::Section {
            section_id: section_id.into(),
            source,
        }
    }

    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        Error::Xml(err.to_string())
    }
}
