//! # tenant_document
//!
//! Document resolution and keyword templating for tenantkit.
//!
//! A configuration document is loaded in three steps:
//!
//! - **Include resolution**: `!include <path>` nodes are replaced by the
//!   parsed content of the referenced file, with cycle detection
//! - **Keyword substitution**: `@@NAME@@` / `##NAME##` markers in string
//!   leaves are replaced from a keyword mapping
//! - **Provenance**: the original text of every substituted leaf is kept in a
//!   side table so a later dump can restore the markers
//!
//! ## Example
//!
//! ```rust,no_run
//! use tenant_document::{DocumentLoader, KeywordEngine, KeywordMappings};
//!
//! let mut mappings = KeywordMappings::new();
//! mappings.insert("ENV".to_string(), serde_json::json!("Production"));
//!
//! let loader = DocumentLoader::new(KeywordEngine::new(mappings, true));
//! let doc = loader.load("tenant.yaml").unwrap();
//! println!("{} templated leaves", doc.provenance.len());
//! ```

pub mod error;
pub mod include;
pub mod keywords;
pub mod loader;
pub mod provenance;

pub use error::{DocumentError, DocumentResult};
pub use include::{IncludeOrigins, IncludeResolver, INCLUDE_TAG};
pub use keywords::{Delimiter, KeywordEngine, KeywordMappings, Segment, Substituted, Template};
pub use loader::{DocumentLoader, LoadedDocument, RenderedText};
pub use provenance::{
    LeafPath, PathSegment, ProvenanceEntry, ProvenanceIndex, SubstitutionMode, IDENTITY_FIELDS,
};
