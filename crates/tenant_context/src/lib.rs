//! # tenant_context
//!
//! Orchestrates a tenantkit run.
//!
//! Loading resolves a configuration (a YAML document with `!include`s, or a
//! directory tree), substitutes keywords and hands each resource type to its
//! handler, producing an [`AssetBundle`](tenant_assets::AssetBundle) plus the
//! provenance of every templated leaf.
//!
//! Dumping runs the other way: identifiers are stripped, secrets masked,
//! keyword templates restored where the value still matches, and every
//! handler's files are written. A failing handler does not stop its siblings;
//! failures are reported together once all writes finish.

pub mod config;
pub mod context;
pub mod error;
pub mod exclusions;
pub mod lookup;
pub mod masking;

pub use config::ContextConfig;
pub use context::{Context, DumpReport, DEFAULT_YAML_FILE};
pub use error::{ContextError, ContextResult, HandlerFailure};
pub use exclusions::ExclusionRules;
pub use lookup::{ClientName, NameLookup, OfflineLookup};
pub use masking::{placeholder, MaskRule, SecretMasker, SubtypeMatch};
