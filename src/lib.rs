//! # pdfkern
//!
//! PDF object-tree parser and serializer. A document is read into a mutable
//! tree of typed values, inspected or rewritten in place, and serialized
//! back into a spec-conformant PDF file.
//!
//! The crate is a pure bytes-in/bytes-out library: no file I/O, no global
//! state. Recoverable trouble (wrong `/Length`, dangling references,
//! repaired page-tree counts) is reported through the [`log`] facade;
//! fatal conditions surface as [`PdfError`].
//!
//! ## Quick Start
//!
//! ```rust
//! use pdfkern::Document;
//!
//! // The smallest well-formed document: catalog, empty page tree, info.
//! let mut doc = Document::new();
//! let bytes = doc.to_bytes().unwrap();
//! assert!(bytes.starts_with(b"%PDF-1.4\n"));
//!
//! // Read it back and poke at the tree.
//! let reparsed = Document::parse(&bytes).unwrap();
//! let root = reparsed.root().unwrap();
//! let catalog = reparsed.node(root).as_dict().unwrap();
//! assert_eq!(catalog.get(b"Type").unwrap().as_name(), Some(&b"Catalog"[..]));
//! ```
//!
//! ## Supported surface
//!
//! | Area | Coverage |
//! |------|----------|
//! | Object syntax | full lexical alphabet incl. comments, name escapes, nested strings |
//! | Cross references | classic tables, PDF 1.5 xref streams, incremental-update chains |
//! | Object streams | read (`/ObjStm` expansion) and write (packing, `Extends` chains) |
//! | Filters | FlateDecode decode/encode; everything else passes through opaquely |
//! | Content streams | optional whitespace minification with round-trip verification |
//!
//! Rendering, fonts, encryption, signatures, linearization and incremental
//! *output* are out of scope; output is always a full-file rewrite.

pub mod core;

mod filters;
mod parser;
mod writer;

// Re-export core types at crate root for convenience
pub use crate::core::*;

pub use crate::writer::minify_content_stream;
