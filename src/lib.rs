//! Resolve, merge, and validate OCSF schema definition trees.
//!
//! `ocsf-validator` reads a checkout of the [OCSF](https://schema.ocsf.io/)
//! (Open Cybersecurity Schema Framework) schema repository, where each
//! object, event, profile, and include is a separate JSON document, and
//! produces the fully merged view of every document.
//!
//! # Features
//!
//! - Loads `objects/`, `events/`, `profiles/`, `includes/`, `enums/` and
//!   vendor `extensions/` trees into an in-memory store
//! - Classifies each document by path (dictionary, object, event, ...)
//! - Resolves `$include` at any depth, `extends` by nearest-ancestor lookup,
//!   and `profiles` with extension-local shadowing
//! - Fills attribute stubs from the extension and root dictionaries
//! - Merges dependency-first, detecting self-references, redundant
//!   directives, and cycles
//! - Reports every problem in one pass, or stops at the first one
//! - Checks merged documents for missing and unrecognized keys
//!
//! # Usage
//!
//! ```no_run
//! use ocsf_validator::error::Collector;
//! use ocsf_validator::processor::process_includes;
//! use ocsf_validator::reader::{Reader, ReaderOptions};
//! use ocsf_validator::type_mapping::TypeMapping;
//!
//! let mut reader = Reader::load(&ReaderOptions::new("ocsf-schema/"))?;
//! let mut collector = Collector::accumulate();
//! let types = TypeMapping::new(&reader, &mut collector)?;
//! let stats = process_includes(&mut reader, &types, &mut collector, true)?;
//! eprintln!("Merged {} documents, {} problems", stats.documents_merged, collector.len());
//! # Ok::<(), ocsf_validator::error::Error>(())
//! ```

pub mod directives;
pub mod error;
pub mod matchers;
pub mod merge;
pub mod processor;
pub mod reader;
pub mod resolver;
pub mod runner;
pub mod type_mapping;
pub mod types;
pub mod validators;
