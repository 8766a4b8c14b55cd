//! Panorama security rulebase flattening.
//!
//! Reads a Panorama configuration export and produces one self-contained JSON
//! document per security rule, with every object reference resolved through
//! the device-group inheritance chain.
//!
//! # Architecture
//!
//! - [`settings`] — Output directory, zone rescan threshold, predefined objects
//! - [`catalog`] — Device-group hierarchy, per-scope object tables, and zones
//! - [`resolve`] — Reference resolution and group expansion (the core)
//! - [`observe`] — Observer hooks the resolver reports recoverable problems to
//! - [`rules`] — Rulebase walk and output document construction
//! - [`sink`] — NDJSON writer with staged output files
//! - [`summary`] — End-of-run tallies
//!
//! # Workflow
//!
//! 1. **Parse** the export with `xml-tree-core`
//! 2. **Build** the [`catalog::Catalog`] once; it is read-only afterwards
//! 3. **Walk** every device group's pre, local, and post rulebases
//! 4. **Resolve** each rule's references with a [`resolve::Resolver`]
//! 5. **Write** one NDJSON line per rule and report the tallies
//!
//! # Examples
//!
//! ```ignore
//! use pano_rules::catalog::build_catalog;
//! use pano_rules::observe::TracingObserver;
//! use pano_rules::resolve::Resolver;
//! use pano_rules::settings::default_settings;
//! use xml_tree_core::parse_file;
//!
//! let root = parse_file("panorama.xml")?;
//! let (catalog, report) = build_catalog(&root, &default_settings());
//! let resolver = Resolver::new(&catalog, &TracingObserver);
//! let values = resolver.expand_addresses("Branch-DG", &["web-servers"]);
//! println!("{values:?} ({} catalog issues)", report.issues.len());
//! ```

pub mod catalog;
pub mod observe;
pub mod resolve;
pub mod rules;
pub mod settings;
pub mod sink;
pub mod summary;
