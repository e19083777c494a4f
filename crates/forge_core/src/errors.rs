//! Error Types
//!
//! This module defines the error type shared by every Forge crate.
//!
//! # Overview
//!
//! [`ForgeError`] covers the failure modes of load/init operations:
//! - Structural problems (malformed skeleton or scene graph)
//! - Invalid indices (bone ids, clip ids, vertex indices)
//! - Missing references (empty meshes, unknown handles)
//! - Clip persistence (I/O and malformed streams)
//!
//! Per-frame operations (sampling, traversal, dispatch) do not return errors;
//! they degrade to documented fallbacks instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use forge_core::errors::{ForgeError, Result};
//!
//! fn load_skeleton() -> Result<()> {
//!     Err(ForgeError::Structural("skeleton has no root bone".into()))
//! }
//! ```

use thiserror::Error;

/// The main error type for the Forge engine.
#[derive(Error, Debug)]
pub enum ForgeError {
    // ========================================================================
    // Structural Errors
    // ========================================================================
    /// Malformed hierarchy: no root, several roots, a cycle, or an invalid link.
    #[error("Structural error: {0}")]
    Structural(String),

    /// An index was outside the valid range.
    #[error("Index out of bounds: {context} (index: {index})")]
    IndexOutOfBounds {
        /// Description of what was being accessed
        context: String,
        /// The invalid index
        index: usize,
    },

    // ========================================================================
    // Reference Errors
    // ========================================================================
    /// A required object was missing or empty.
    #[error("Missing reference: {0}")]
    MissingReference(String),

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// The clip stream could not be decoded.
    #[error("Clip format error: {0}")]
    ClipFormat(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Shorthand for [`ForgeError::IndexOutOfBounds`].
    pub fn out_of_bounds(context: impl Into<String>, index: usize) -> Self {
        Self::IndexOutOfBounds {
            context: context.into(),
            index,
        }
    }
}

/// Alias for `Result<T, ForgeError>`.
pub type Result<T> = std::result::Result<T, ForgeError>;
