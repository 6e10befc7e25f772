//! # webbook
//!
//! Turn an EPUB3 package into a WebBook: a plain website whose entry point is
//! a topmost `index.xhtml`.
//!
//! The package's Navigation Document is copied to `index.xhtml` at the
//! package root, every link it holds is rewritten to work from there, its
//! table of contents is tagged with `role="doc-toc"`, and the OPF manifest is
//! updated to point at the new file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use webbook::{Config, Outcome, convert};
//!
//! match convert(Path::new("book.epub"), &Config::default())? {
//!     Outcome::Converted(c) => println!("entry point: {}", c.to),
//!     Outcome::AlreadyWebBook { .. } => println!("nothing to do"),
//!     Outcome::NoRendition => println!("no EPUB rendition declared"),
//! }
//! # Ok::<(), webbook::Error>(())
//! ```
//!
//! An already extracted package can be processed directly:
//!
//! ```no_run
//! let outcome = webbook::Pipeline::new("extracted").run()?;
//! # Ok::<(), webbook::Error>(())
//! ```

pub mod archive;
pub mod container;
pub mod error;
pub mod nav;
pub mod package;
pub mod path;
pub mod pipeline;
pub mod xml;

pub use archive::{ArchiveSource, PackageRoot, ZipExtractor};
pub use error::{Error, Result};
pub use pipeline::{Config, Conversion, Outcome, Pipeline, convert, convert_with};
