//! The unresolved descriptor set of one manifest.

use crate::error::{CompileError, ConfigurationError, EncodingOverflowError};
use crate::schema::{DescriptorKind, KindSpec, Schema, SchemaVersion};
use std::collections::BTreeMap;

/// Field name carrying the bytes of a string descriptor.
pub const PAYLOAD_FIELD: &str = "string";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(u64),
    Bytes(Vec<u8>),
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Bytes(v.into_bytes())
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

/// User-supplied values for one descriptor, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(name.into(), value.into())
    }

}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One descriptor as supplied, before size and type are known.
///
/// `values` follows the kind's field layout; fields the source left out are
/// zero and derived fields stay zero until resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub(crate) name: String,
    pub(crate) kind: DescriptorKind,
    pub(crate) values: Vec<u64>,
    pub(crate) payload: Vec<u8>,
}

impl Descriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn build(spec: &KindSpec, name: String, fields: Fields) -> Result<Self, CompileError> {
        let kind = spec.kind;
        let mut values = vec![0u64; spec.fields.len()];
        let mut payload = Vec::new();

        for (field, value) in fields.0 {
            if spec.has_payload() && field == PAYLOAD_FIELD {
                match value {
                    FieldValue::Bytes(bytes) => payload = bytes,
                    FieldValue::Int(_) => {
                        return Err(ConfigurationError::FieldType {
                            kind,
                            name,
                            field,
                            expected: "a string",
                        }
                        .into());
                    }
                }
                continue;
            }

            let Some((index, layout)) = spec.field(&field) else {
                return Err(ConfigurationError::UnknownField { kind, name, field }.into());
            };
            if layout.derived {
                return Err(ConfigurationError::DerivedField { kind, name, field }.into());
            }
            match value {
                FieldValue::Int(v) if v > layout.width.max() => {
                    return Err(EncodingOverflowError::FieldTooWide {
                        kind,
                        name,
                        field: layout.name,
                        value: v,
                        width: layout.width,
                    }
                    .into());
                }
                FieldValue::Int(v) => values[index] = v,
                FieldValue::Bytes(_) => {
                    return Err(ConfigurationError::FieldType {
                        kind,
                        name,
                        field,
                        expected: "an integer",
                    }
                    .into());
                }
            }
        }

        Ok(Descriptor {
            name,
            kind,
            values,
            payload,
        })
    }
}

/// A manifest under construction for one schema version.
#[derive(Debug, Clone)]
pub struct ManifestModel {
    pub(crate) schema: &'static Schema,
    pub(crate) header_version: (u8, u8),
    // names order emission within a kind
    pub(crate) groups: BTreeMap<DescriptorKind, BTreeMap<String, Descriptor>>,
}

pub fn new_manifest(version: SchemaVersion) -> ManifestModel {
    ManifestModel::new(version)
}

impl ManifestModel {
    pub fn new(version: SchemaVersion) -> Self {
        let schema = version.schema();
        Self {
            schema,
            header_version: schema.header_version,
            groups: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn set_header_version(&mut self, major: u8, minor: u8) {
        self.header_version = (major, minor);
    }

    pub fn header_version(&self) -> (u8, u8) {
        self.header_version
    }

    /// Insert one descriptor.
    ///
    /// Fails if `kind` is not part of the schema, if `name` is already taken
    /// within `kind` (or a singleton is already present), or if a field is
    /// unknown, mistyped or too wide for its slot.
    pub fn add(
        &mut self,
        kind: DescriptorKind,
        name: impl Into<String>,
        fields: Fields,
    ) -> Result<(), CompileError> {
        let name = name.into();
        let spec = self.schema.kind(kind)?;
        let group = self.groups.entry(kind).or_default();

        if spec.singleton && !group.is_empty() {
            return Err(ConfigurationError::DuplicateSingleton { kind, name }.into());
        }
        if group.contains_key(&name) {
            return Err(ConfigurationError::DuplicateName { kind, name }.into());
        }

        let descriptor = Descriptor::build(spec, name.clone(), fields)?;
        group.insert(name, descriptor);
        Ok(())
    }

    /// Descriptors of one kind in emission order.
    pub fn descriptors(&self, kind: DescriptorKind) -> impl Iterator<Item = &Descriptor> {
        self.groups.get(&kind).into_iter().flat_map(|g| g.values())
    }

    pub fn singleton(&self) -> Option<&Descriptor> {
        self.descriptors(self.schema.singleton().kind).next()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ManifestModel {
        new_manifest(SchemaVersion::V1)
    }

    #[test]
    fn add_stores_values_in_layout_order() {
        let mut m = model();
        m.add(
            DescriptorKind::Cport,
            "gpio",
            Fields::new()
                .with("protocol", 2u8)
                .with("id", 0x0102u16)
                .with("interface", 1u8),
        )
        .unwrap();

        let cport = m.descriptors(DescriptorKind::Cport).next().unwrap();
        assert_eq!(cport.name(), "gpio");
        assert_eq!(cport.values(), &[1, 0x0102, 2]);
        assert!(cport.payload().is_empty());
    }

    #[test]
    fn omitted_fields_are_zero() {
        let mut m = model();
        m.add(DescriptorKind::Module, "module", Fields::new().with("vendor", 0xffffu16))
            .unwrap();
        let module = m.singleton().unwrap();
        assert_eq!(module.values(), &[0xffff, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn header_version_defaults_to_schema_and_can_be_set() {
        let mut m = model();
        assert_eq!(m.header_version(), (0, 1));
        m.set_header_version(1, 7);
        assert_eq!(m.header_version(), (1, 7));
    }

    #[test]
    fn duplicate_names_within_a_kind_are_rejected() {
        let mut m = model();
        m.add(DescriptorKind::Cport, "a", Fields::new()).unwrap();
        // same name under another kind is fine
        m.add(DescriptorKind::Class, "a", Fields::new()).unwrap();

        let err = m.add(DescriptorKind::Cport, "a", Fields::new()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::DuplicateName { kind: DescriptorKind::Cport, ref name }) if name == "a"
        ));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn second_singleton_is_rejected() {
        let mut m = model();
        m.add(DescriptorKind::Module, "one", Fields::new()).unwrap();
        let err = m.add(DescriptorKind::Module, "two", Fields::new()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::DuplicateSingleton { .. })
        ));
    }

    #[test]
    fn kind_outside_schema_is_rejected() {
        let mut m = model();
        let err = m.add(DescriptorKind::Bundle, "b", Fields::new()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::KindNotInSchema {
                kind: DescriptorKind::Bundle,
                version: SchemaVersion::V1
            })
        ));
        assert!(m.is_empty());
    }

    #[test]
    fn field_errors() {
        let mut m = model();

        let err = m
            .add(DescriptorKind::Cport, "x", Fields::new().with("speed", 1u8))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::UnknownField { .. })
        ));

        let err = m
            .add(DescriptorKind::String, "s", Fields::new().with("length", 3u8))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::DerivedField { .. })
        ));

        let err = m
            .add(DescriptorKind::String, "s", Fields::new().with("string", 3u8))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::FieldType { expected: "a string", .. })
        ));

        let err = m
            .add(DescriptorKind::Cport, "x", Fields::new().with("id", "two"))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::FieldType { expected: "an integer", .. })
        ));

        assert!(m.is_empty());
    }

    #[test]
    fn values_wider_than_their_field_overflow() {
        let mut m = model();
        let err = m
            .add(DescriptorKind::Cport, "x", Fields::new().with("interface", 256u16))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "field `interface` of cport descriptor `x` is 256, which does not fit u8"
        );

        m.add(DescriptorKind::Cport, "y", Fields::new().with("id", 0xffffu16))
            .unwrap();
        let err = m
            .add(DescriptorKind::Cport, "z", Fields::new().with("id", 0x1_0000u32))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::EncodingOverflow(EncodingOverflowError::FieldTooWide { .. })
        ));
    }

    #[test]
    fn descriptors_iterate_by_name() {
        let mut m = model();
        for name in ["c", "a", "b"] {
            m.add(DescriptorKind::Class, name, Fields::new()).unwrap();
        }
        let names: Vec<_> = m.descriptors(DescriptorKind::Class).map(Descriptor::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(m.descriptors(DescriptorKind::Interface).count(), 0);
    }

    #[test]
    fn fields_collect_from_pairs() {
        let fields: Fields = [("id", FieldValue::from(1u8)), ("string", "ab".into())]
            .into_iter()
            .collect();
        assert_eq!(fields, Fields::new().with("id", 1u8).with("string", "ab"));
        let mut m = model();
        m.add(DescriptorKind::String, "s", fields).unwrap();
        let s = m.descriptors(DescriptorKind::String).next().unwrap();
        assert_eq!(s.payload(), b"ab");
        assert_eq!(s.values(), &[0, 1]);
    }
}
