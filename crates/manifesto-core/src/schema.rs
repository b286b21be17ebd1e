//! Static registry of the manifest wire formats.
//!
//! Every format generation is a [`Schema`]: the descriptor kinds it knows,
//! their type codes and fixed layouts, the order groups are written in, and the
//! padding rule for string payloads. Nothing here is computed at runtime.

use crate::error::ConfigurationError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Bytes taken by the manifest header (`size: u16`, `major: u8`, `minor: u8`).
pub const MANIFEST_HEADER_SIZE: u16 = 4;

/// Bytes every descriptor starts with (`size: u16`, `type: u8`).
pub const DESCRIPTOR_HEADER_SIZE: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DescriptorKind {
    Module,
    Interface,
    Bundle,
    String,
    Cport,
    Class,
    Function,
}

impl DescriptorKind {
    pub const ALL: [DescriptorKind; 7] = [
        DescriptorKind::Module,
        DescriptorKind::Interface,
        DescriptorKind::Bundle,
        DescriptorKind::String,
        DescriptorKind::Cport,
        DescriptorKind::Class,
        DescriptorKind::Function,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DescriptorKind::Module => "module",
            DescriptorKind::Interface => "interface",
            DescriptorKind::Bundle => "bundle",
            DescriptorKind::String => "string",
            DescriptorKind::Cport => "cport",
            DescriptorKind::Class => "class",
            DescriptorKind::Function => "function",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DescriptorKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DescriptorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownKindName(s.to_string()))
    }
}

/// On-wire width of a fixed field. All multi-byte fields are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U8,
    U16,
    U64,
}

impl Width {
    pub const fn bytes(self) -> u16 {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
            Width::U64 => 8,
        }
    }

    pub const fn max(self) -> u64 {
        match self {
            Width::U8 => u8::MAX as u64,
            Width::U16 => u16::MAX as u64,
            Width::U64 => u64::MAX,
        }
    }

    /// Append `value` at this width. The value must already fit.
    pub(crate) fn put(self, buf: &mut Vec<u8>, value: u64) {
        match self {
            Width::U8 => buf.push(value as u8),
            Width::U16 => buf.extend(&(value as u16).to_le_bytes()),
            Width::U64 => buf.extend(&value.to_le_bytes()),
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::U8 => f.write_str("u8"),
            Width::U16 => f.write_str("u16"),
            Width::U64 => f.write_str("u64"),
        }
    }
}

/// One fixed field after the common `size`/`type` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: Width,
    /// Filled by the resolver (the string `length`), never by the source.
    pub derived: bool,
}

const fn field(name: &'static str, width: Width) -> FieldSpec {
    FieldSpec {
        name,
        width,
        derived: false,
    }
}

const fn derived(name: &'static str, width: Width) -> FieldSpec {
    FieldSpec {
        name,
        width,
        derived: true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    pub kind: DescriptorKind,
    pub type_code: u8,
    pub fields: &'static [FieldSpec],
    pub singleton: bool,
}

impl KindSpec {
    /// Size of the fixed portion, `size` and `type` included.
    pub const fn base_size(&self) -> u16 {
        let mut size = DESCRIPTOR_HEADER_SIZE;
        let mut i = 0;
        while i < self.fields.len() {
            size += self.fields[i].width.bytes();
            i += 1;
        }
        size
    }

    /// Only string descriptors carry bytes after their fixed fields.
    pub fn has_payload(&self) -> bool {
        self.kind == DescriptorKind::String
    }

    pub fn field(&self, name: &str) -> Option<(usize, &'static FieldSpec)> {
        let fields: &'static [FieldSpec] = self.fields;
        fields.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

/// How many zero bytes follow a string payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingPolicy {
    /// Append `raw_len % 4` bytes. Lengths 1 and 3 do not end aligned; older
    /// consumers expect exactly this.
    PadOwnRemainder,
    /// Pad until the whole descriptor, fixed fields included, is a multiple of 4.
    AlignDescriptor,
}

impl PaddingPolicy {
    pub fn padding(self, base_size: u16, raw_len: usize) -> usize {
        match self {
            PaddingPolicy::PadOwnRemainder => raw_len % 4,
            PaddingPolicy::AlignDescriptor => (4 - (base_size as usize + raw_len) % 4) % 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            PaddingPolicy::PadOwnRemainder => "pad-own-remainder",
            PaddingPolicy::AlignDescriptor => "align-descriptor",
        }
    }
}

impl fmt::Display for PaddingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed from text the same way on the command line and in source files:
/// surrounding whitespace and case are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum SchemaVersion {
    /// Module descriptor plus function descriptors.
    V0,
    /// Module descriptor with interface, cport and class descriptors.
    #[default]
    V1,
    /// Interface descriptor with bundle, cport and class descriptors.
    V2,
    /// Interface descriptor with bundle and cport descriptors, no classes.
    V3,
}

impl SchemaVersion {
    pub const ALL: [SchemaVersion; 4] = [
        SchemaVersion::V0,
        SchemaVersion::V1,
        SchemaVersion::V2,
        SchemaVersion::V3,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V0 => "v0",
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
            SchemaVersion::V3 => "v3",
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            SchemaVersion::V0 => &V0,
            SchemaVersion::V1 => &V1,
            SchemaVersion::V2 => &V2,
            SchemaVersion::V3 => &V3,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SchemaVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| ConfigurationError::UnknownSchema(s.to_string()))
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One generation of the wire format.
#[derive(Debug)]
pub struct Schema {
    pub version: SchemaVersion,
    pub summary: &'static str,
    /// Definition order; collections resolve in this order after the singleton
    /// and the strings.
    pub kinds: &'static [KindSpec],
    /// Group order in the byte stream. Strings are always last.
    pub write_order: &'static [DescriptorKind],
    pub padding: PaddingPolicy,
    /// Header version used when the source does not set one.
    pub header_version: (u8, u8),
}

impl Schema {
    pub fn kind(&self, kind: DescriptorKind) -> Result<&'static KindSpec, ConfigurationError> {
        let kinds: &'static [KindSpec] = self.kinds;
        kinds
            .iter()
            .find(|k| k.kind == kind)
            .ok_or(ConfigurationError::KindNotInSchema {
                kind,
                version: self.version,
            })
    }

    pub fn contains(&self, kind: DescriptorKind) -> bool {
        self.kinds.iter().any(|k| k.kind == kind)
    }

    pub fn singleton(&self) -> &'static KindSpec {
        // every registered schema defines its singleton first
        let kinds: &'static [KindSpec] = self.kinds;
        &kinds[0]
    }

    /// Singleton, then strings, then the remaining collections.
    pub fn resolve_order(&self) -> impl Iterator<Item = &'static KindSpec> {
        let kinds: &'static [KindSpec] = self.kinds;
        let singleton = self.singleton();
        let strings = kinds.iter().filter(|k| k.has_payload());
        let rest = kinds.iter().filter(|k| !k.singleton && !k.has_payload());
        std::iter::once(singleton).chain(strings).chain(rest)
    }
}

const MODULE_FIELDS: &[FieldSpec] = &[
    field("vendor", Width::U16),
    field("product", Width::U16),
    field("version", Width::U16),
    field("vendor_string_id", Width::U8),
    field("product_string_id", Width::U8),
    field("unique_id", Width::U64),
];

const INTERFACE_FIELDS: &[FieldSpec] = &[
    field("vendor", Width::U16),
    field("product", Width::U16),
    field("vendor_string_id", Width::U8),
    field("product_string_id", Width::U8),
    field("unique_id", Width::U64),
];

const STRING_FIELDS: &[FieldSpec] = &[derived("length", Width::U8), field("id", Width::U8)];

const CLASS_FIELDS: &[FieldSpec] = &[field("class", Width::U8)];

static V0: Schema = Schema {
    version: SchemaVersion::V0,
    summary: "module + function",
    kinds: &[
        KindSpec {
            kind: DescriptorKind::Module,
            type_code: 1,
            fields: MODULE_FIELDS,
            singleton: true,
        },
        KindSpec {
            kind: DescriptorKind::Function,
            type_code: 2,
            fields: &[field("cport", Width::U16), field("function_type", Width::U8)],
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::String,
            type_code: 4,
            fields: STRING_FIELDS,
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Cport,
            type_code: 5,
            fields: &[field("id", Width::U16), field("protocol", Width::U8)],
            singleton: false,
        },
    ],
    write_order: &[
        DescriptorKind::Function,
        DescriptorKind::Module,
        DescriptorKind::Cport,
        DescriptorKind::String,
    ],
    padding: PaddingPolicy::PadOwnRemainder,
    header_version: (0, 1),
};

static V1: Schema = Schema {
    version: SchemaVersion::V1,
    summary: "module + interface + cport + class",
    kinds: &[
        KindSpec {
            kind: DescriptorKind::Module,
            type_code: 1,
            fields: MODULE_FIELDS,
            singleton: true,
        },
        KindSpec {
            kind: DescriptorKind::String,
            type_code: 2,
            fields: STRING_FIELDS,
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Interface,
            type_code: 3,
            fields: &[field("id", Width::U8)],
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Cport,
            type_code: 4,
            fields: &[
                field("interface", Width::U8),
                field("id", Width::U16),
                field("protocol", Width::U8),
            ],
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Class,
            type_code: 5,
            fields: CLASS_FIELDS,
            singleton: false,
        },
    ],
    write_order: &[
        DescriptorKind::Module,
        DescriptorKind::Cport,
        DescriptorKind::Interface,
        DescriptorKind::Class,
        DescriptorKind::String,
    ],
    padding: PaddingPolicy::PadOwnRemainder,
    header_version: (0, 1),
};

const BUNDLE_CPORT_FIELDS: &[FieldSpec] = &[
    field("bundle", Width::U8),
    field("id", Width::U16),
    field("protocol", Width::U8),
];

static V2: Schema = Schema {
    version: SchemaVersion::V2,
    summary: "interface + bundle + cport + class",
    kinds: &[
        KindSpec {
            kind: DescriptorKind::Interface,
            type_code: 1,
            fields: INTERFACE_FIELDS,
            singleton: true,
        },
        KindSpec {
            kind: DescriptorKind::String,
            type_code: 2,
            fields: STRING_FIELDS,
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Bundle,
            type_code: 3,
            fields: &[field("id", Width::U8)],
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Cport,
            type_code: 4,
            fields: BUNDLE_CPORT_FIELDS,
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Class,
            type_code: 5,
            fields: CLASS_FIELDS,
            singleton: false,
        },
    ],
    write_order: &[
        DescriptorKind::Interface,
        DescriptorKind::Bundle,
        DescriptorKind::Cport,
        DescriptorKind::Class,
        DescriptorKind::String,
    ],
    padding: PaddingPolicy::AlignDescriptor,
    header_version: (0, 1),
};

static V3: Schema = Schema {
    version: SchemaVersion::V3,
    summary: "interface + bundle + cport",
    kinds: &[
        KindSpec {
            kind: DescriptorKind::Interface,
            type_code: 1,
            fields: INTERFACE_FIELDS,
            singleton: true,
        },
        KindSpec {
            kind: DescriptorKind::String,
            type_code: 2,
            fields: STRING_FIELDS,
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Bundle,
            type_code: 3,
            fields: &[field("id", Width::U8), field("class", Width::U8)],
            singleton: false,
        },
        KindSpec {
            kind: DescriptorKind::Cport,
            type_code: 4,
            fields: BUNDLE_CPORT_FIELDS,
            singleton: false,
        },
    ],
    write_order: &[
        DescriptorKind::Interface,
        DescriptorKind::Cport,
        DescriptorKind::Bundle,
        DescriptorKind::String,
    ],
    padding: PaddingPolicy::AlignDescriptor,
    header_version: (0, 1),
};
