//! Core value model, document container, errors, and validation.
//!
//! This module provides the typed tree a PDF file parses into: the
//! [`Object`] sum type, the [`Document`] arena that owns it, and the
//! structural validation run on read and write.

mod value;

mod dates;
mod document;
mod error;
mod validation;

pub use dates::*;
pub use document::*;
pub use error::*;
pub use validation::*;
pub use value::*;
