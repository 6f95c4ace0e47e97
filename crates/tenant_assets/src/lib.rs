//! # tenant_assets
//!
//! Asset bundle and per-resource-type handlers for tenantkit.
//!
//! A handler translates between a slice of a resolved configuration document
//! and one entry of the [`AssetBundle`], and back into files on dump:
//!
//! - **Singletons** (the tenant settings) map to one object
//! - **Collections** (clients, rules, ...) map to a list of named entries,
//!   optionally with an auxiliary code file per entry
//!
//! The [`HandlerRegistry`] holds the fixed table of handlers. The
//! [`DirectoryReader`] assembles the directory format into the same document
//! shape the YAML format produces, so handlers never branch on the input
//! layout when loading.

pub mod bundle;
pub mod directory;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;

pub use bundle::AssetBundle;
pub use directory::{AssembledDocument, DirectoryReader};
pub use error::{AssetError, AssetResult};
pub use handler::{
    AssetHandler, AssetShape, CrossReferences, FileWrite, FileWriteSet, Format, LoadContext,
    SaveContext,
};
pub use handlers::{sanitize_name, CodeFile, CollectionHandler, TenantHandler};
pub use registry::HandlerRegistry;
