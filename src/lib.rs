//! # QRSeal
//!
//! Stamp PDF documents with QR verification seals.
//!
//! qrseal normalizes heterogeneous inputs — raster images, Word
//! documents, existing PDFs (plain or password-protected) — into PDF
//! outputs, overlays an identical constellation of uniquely-keyed QR
//! tokens on every page, rewrites descriptive metadata, and re-applies
//! access control where the source carried it.
//!
//! ## Core pieces
//!
//! - **PDF core**: lexer, object parser, xref (tables and streams),
//!   object streams, stream filters, and the standard security handler
//!   for reading; an object assembler with optional encryption for
//!   writing.
//! - **Stamping engine**: one [`stamp::StampPlan`] per input file drives
//!   two content-preservation strategies — opaque template import for
//!   unprotected PDFs, decode/re-emit reconstruction for encrypted ones —
//!   under a single placement contract.
//! - **Normalizers**: PNG/JPEG and DOCX inputs become baseline PDFs that
//!   feed the same pipeline.
//! - **Batch orchestration**: [`pipeline::process_directory`] walks an
//!   input directory with file-scoped failure isolation.
//!
//! ## Quick start
//!
//! ```no_run
//! use qrseal::pipeline::{StampConfig, process_directory};
//!
//! # fn main() -> qrseal::Result<()> {
//! qrseal::init();
//!
//! let config = StampConfig::new()
//!     .with_password("s3cret")
//!     .with_custom_position(300.0, 400.0);
//!
//! let report = process_directory("inbox", &config)?;
//! println!("{} stamped, {} failed", report.succeeded(), report.failed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Encryption support
pub mod encryption;

// PDF writing
pub mod writer;

// Stamping engine
pub mod stamp;

// Metadata embedding
pub mod metadata;

// Format normalization
pub mod convert;

// Batch orchestration
pub mod pipeline;

// Re-exports
pub use convert::SourceFormat;
pub use document::{InspectReport, PdfDocument, inspect};
pub use error::{Error, Result};
pub use pipeline::{BatchReport, StampConfig, process_directory};
pub use stamp::{StampPlan, StampPosition, TokenMinter, TokenRef};

use std::sync::Once;

static INIT: Once = Once::new();

/// Process-wide initialization: sets up the logger.
///
/// Explicit and idempotent — calling it again is a no-op, and no core
/// path depends on it having run. Orchestrating callers should invoke it
/// once before entering the pipeline.
pub fn init() {
    INIT.call_once(|| {
        // A logger may already be installed by the host application
        let _ = env_logger::Builder::from_default_env().try_init();
    });
}

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
