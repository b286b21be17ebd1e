use crate::schema::{DescriptorKind, SchemaVersion, Width};

/// The descriptor set does not fit the selected schema.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown descriptor kind `{0}`")]
    UnknownKindName(String),
    #[error("unknown schema version `{0}`")]
    UnknownSchema(String),
    #[error("{kind} descriptors are not part of schema {version}")]
    KindNotInSchema {
        kind: DescriptorKind,
        version: SchemaVersion,
    },
    #[error("duplicate {kind} descriptor `{name}`")]
    DuplicateName { kind: DescriptorKind, name: String },
    #[error("only one {kind} descriptor is allowed, `{name}` would be a second")]
    DuplicateSingleton { kind: DescriptorKind, name: String },
    #[error("manifest has no {0} descriptor")]
    MissingSingleton(DescriptorKind),
    #[error("{kind} descriptor `{name}` has no field `{field}`")]
    UnknownField {
        kind: DescriptorKind,
        name: String,
        field: String,
    },
    #[error("field `{field}` of {kind} descriptor `{name}` is computed and cannot be set")]
    DerivedField {
        kind: DescriptorKind,
        name: String,
        field: String,
    },
    #[error("field `{field}` of {kind} descriptor `{name}` must be {expected}")]
    FieldType {
        kind: DescriptorKind,
        name: String,
        field: String,
        expected: &'static str,
    },
}

/// A value cannot be represented in its wire field.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingOverflowError {
    #[error("string descriptor `{name}` is {len} bytes long, the length field holds at most 255")]
    StringTooLong { name: String, len: usize },
    #[error("field `{field}` of {kind} descriptor `{name}` is {value}, which does not fit {width}")]
    FieldTooWide {
        kind: DescriptorKind,
        name: String,
        field: &'static str,
        value: u64,
        width: Width,
    },
    #[error("manifest is {size} bytes, the header size field holds at most 65535")]
    ManifestTooLarge { size: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    EncodingOverflow(#[from] EncodingOverflowError),
    #[error("failed to write manifest")]
    Io(#[from] std::io::Error),
}
