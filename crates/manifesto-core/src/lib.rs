//! Schema-driven compiler for binary module manifests.
//!
//! A manifest is built in three typed stages:
//!
//! 1. [`ManifestModel`]: descriptors as supplied, validated against a [`Schema`].
//! 2. [`ResolvedManifest`]: sizes, type codes and the header total stamped in.
//! 3. bytes: [`serialize`] or [`write_to`].
//!
//! ```
//! use manifesto_core::{DescriptorKind, Fields, SchemaVersion, new_manifest, resolve, serialize};
//!
//! let mut model = new_manifest(SchemaVersion::V1);
//! model.add(DescriptorKind::Module, "module", Fields::new().with("vendor", 0xffffu16))?;
//! model.add(DescriptorKind::String, "vendor", Fields::new().with("id", 1u8).with("string", "ab"))?;
//!
//! let resolved = resolve(model)?;
//! assert_eq!(resolved.header().total_size, 32);
//! assert_eq!(serialize(&resolved).len(), 32);
//! # Ok::<(), manifesto_core::CompileError>(())
//! ```

pub mod error;
pub mod model;
pub mod resolve;
pub mod schema;
pub mod serialize;

pub use error::{CompileError, ConfigurationError, EncodingOverflowError};
pub use model::{Descriptor, FieldValue, Fields, ManifestModel, PAYLOAD_FIELD, new_manifest};
pub use resolve::{ManifestHeader, ResolvedDescriptor, ResolvedManifest, resolve};
pub use schema::{
    DescriptorKind, FieldSpec, KindSpec, MANIFEST_HEADER_SIZE, PaddingPolicy, Schema,
    SchemaVersion, Width,
};
pub use serialize::{serialize, write_to};

/// Resolve and serialize in one step.
pub fn compile(model: ManifestModel) -> Result<Vec<u8>, CompileError> {
    let resolved = resolve(model)?;
    Ok(serialize(&resolved))
}
