//! Size and type stamping.
//!
//! [`resolve`] consumes a [`ManifestModel`] and yields a [`ResolvedManifest`].
//! A resolved manifest has no way back into the resolver, so sizes can never
//! be counted twice:
//!
//! ```compile_fail
//! use manifesto_core::{Fields, DescriptorKind, SchemaVersion, new_manifest, resolve};
//!
//! let mut model = new_manifest(SchemaVersion::V1);
//! model.add(DescriptorKind::Module, "module", Fields::new()).unwrap();
//! let resolved = resolve(model).unwrap();
//! let twice = resolve(resolved);
//! ```

use crate::error::{CompileError, ConfigurationError, EncodingOverflowError};
use crate::model::{Descriptor, ManifestModel};
use crate::schema::{DescriptorKind, KindSpec, MANIFEST_HEADER_SIZE, PaddingPolicy, Schema};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestHeader {
    pub total_size: u16,
    pub version_major: u8,
    pub version_minor: u8,
}

impl ManifestHeader {
    pub fn to_bytes(&self) -> [u8; MANIFEST_HEADER_SIZE as usize] {
        let [lo, hi] = self.total_size.to_le_bytes();
        [lo, hi, self.version_major, self.version_minor]
    }
}

/// A descriptor with its wire size and type code stamped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDescriptor {
    pub name: String,
    pub kind: DescriptorKind,
    pub size: u16,
    pub type_code: u8,
    /// Layout-ordered field values, derived fields filled in.
    pub values: Vec<u64>,
    /// Payload including its zero padding.
    pub payload: Vec<u8>,
}

/// All descriptors of one kind, with the layout they were stamped against.
#[derive(Debug, Clone)]
struct ResolvedGroup {
    spec: &'static KindSpec,
    descriptors: Vec<ResolvedDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    schema: &'static Schema,
    header: ManifestHeader,
    groups: BTreeMap<DescriptorKind, ResolvedGroup>,
}

impl ResolvedManifest {
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn header(&self) -> &ManifestHeader {
        &self.header
    }

    pub fn descriptors(&self, kind: DescriptorKind) -> &[ResolvedDescriptor] {
        self.groups
            .get(&kind)
            .map_or(&[], |group| group.descriptors.as_slice())
    }

    /// Non-empty groups in wire order, each with its kind's layout.
    pub fn groups(&self) -> impl Iterator<Item = (&'static KindSpec, &[ResolvedDescriptor])> {
        self.schema
            .write_order
            .iter()
            .filter_map(|kind| self.groups.get(kind))
            .filter(|group| !group.descriptors.is_empty())
            .map(|group| (group.spec, group.descriptors.as_slice()))
    }

    /// Every descriptor in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedDescriptor> {
        self.groups().flat_map(|(_, descriptors)| descriptors)
    }
}

/// Stamp sizes and type codes and compute the header.
///
/// Fails on a missing singleton, a string longer than 255 bytes, or a manifest
/// whose total does not fit the 16-bit header size.
pub fn resolve(model: ManifestModel) -> Result<ResolvedManifest, CompileError> {
    let ManifestModel {
        schema,
        header_version: (version_major, version_minor),
        mut groups,
    } = model;

    let singleton = schema.singleton().kind;
    if groups.get(&singleton).is_none_or(BTreeMap::is_empty) {
        return Err(ConfigurationError::MissingSingleton(singleton).into());
    }

    let mut total: usize = 0;
    let mut resolved = BTreeMap::new();
    for spec in schema.resolve_order() {
        let Some(group) = groups.remove(&spec.kind) else {
            continue;
        };
        let mut out = Vec::with_capacity(group.len());
        for descriptor in group.into_values() {
            let descriptor = if spec.has_payload() {
                resolve_string(spec, schema.padding, descriptor)?
            } else {
                stamp(spec, descriptor)
            };
            log::debug!(
                "{} `{}`: type {}, {} bytes",
                descriptor.kind,
                descriptor.name,
                descriptor.type_code,
                descriptor.size
            );
            total += usize::from(descriptor.size);
            out.push(descriptor);
        }
        resolved.insert(
            spec.kind,
            ResolvedGroup {
                spec,
                descriptors: out,
            },
        );
    }

    let size = usize::from(MANIFEST_HEADER_SIZE) + total;
    let total_size =
        u16::try_from(size).map_err(|_| EncodingOverflowError::ManifestTooLarge { size })?;

    Ok(ResolvedManifest {
        schema,
        header: ManifestHeader {
            total_size,
            version_major,
            version_minor,
        },
        groups: resolved,
    })
}

fn stamp(spec: &KindSpec, descriptor: Descriptor) -> ResolvedDescriptor {
    ResolvedDescriptor {
        name: descriptor.name,
        kind: descriptor.kind,
        size: spec.base_size(),
        type_code: spec.type_code,
        values: descriptor.values,
        payload: descriptor.payload,
    }
}

fn resolve_string(
    spec: &KindSpec,
    policy: PaddingPolicy,
    descriptor: Descriptor,
) -> Result<ResolvedDescriptor, EncodingOverflowError> {
    let Descriptor {
        name,
        kind,
        mut values,
        mut payload,
    } = descriptor;

    let raw_len = payload.len();
    if raw_len > usize::from(u8::MAX) {
        return Err(EncodingOverflowError::StringTooLong { name, len: raw_len });
    }
    for (slot, field) in values.iter_mut().zip(spec.fields) {
        if field.derived {
            *slot = raw_len as u64;
        }
    }

    let base = spec.base_size();
    payload.resize(raw_len + policy.padding(base, raw_len), 0);

    Ok(ResolvedDescriptor {
        name,
        kind,
        // at most 255 + 3 padding bytes
        size: base + payload.len() as u16,
        type_code: spec.type_code,
        values,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fields, new_manifest};
    use crate::schema::SchemaVersion;

    fn with_singleton(version: SchemaVersion) -> ManifestModel {
        let mut m = new_manifest(version);
        let kind = version.schema().singleton().kind;
        m.add(kind, kind.as_str(), Fields::new()).unwrap();
        m
    }

    fn string_size(version: SchemaVersion, s: &[u8]) -> (u16, u64, usize) {
        let mut m = with_singleton(version);
        m.add(
            DescriptorKind::String,
            "s",
            Fields::new().with("id", 1u8).with("string", s.to_vec()),
        )
        .unwrap();
        let r = resolve(m).unwrap();
        let d = &r.descriptors(DescriptorKind::String)[0];
        (d.size, d.values[0], d.payload.len())
    }

    #[test]
    fn scenario_module_and_one_string() {
        let mut m = with_singleton(SchemaVersion::V1);
        m.add(
            DescriptorKind::String,
            "vendor",
            Fields::new().with("id", 1u8).with("string", "ab"),
        )
        .unwrap();

        let r = resolve(m).unwrap();
        let module = &r.descriptors(DescriptorKind::Module)[0];
        assert_eq!((module.size, module.type_code), (19, 1));

        let s = &r.descriptors(DescriptorKind::String)[0];
        assert_eq!((s.size, s.type_code), (9, 2));
        assert_eq!(s.values, [2, 1]);
        assert_eq!(s.payload, b"ab\0\0");

        assert_eq!(r.header().total_size, 32);
    }

    #[test]
    fn scenario_with_two_cports() {
        let mut m = with_singleton(SchemaVersion::V1);
        m.add(
            DescriptorKind::String,
            "vendor",
            Fields::new().with("id", 1u8).with("string", "ab"),
        )
        .unwrap();
        for (name, id) in [("a", 1u16), ("b", 2u16)] {
            m.add(DescriptorKind::Cport, name, Fields::new().with("id", id))
                .unwrap();
        }

        let r = resolve(m).unwrap();
        assert!(r.descriptors(DescriptorKind::Class).is_empty());
        for cport in r.descriptors(DescriptorKind::Cport) {
            assert_eq!((cport.size, cport.type_code), (7, 4));
        }
        assert_eq!(r.header().total_size, 46);
    }

    #[test]
    fn pad_own_remainder_lengths() {
        for len in [0usize, 1, 2, 3, 4, 5, 8, 255] {
            let (size, length, payload) = string_size(SchemaVersion::V1, &vec![b'x'; len]);
            assert_eq!(length, len as u64);
            assert_eq!(payload, len + len % 4, "len {len}");
            assert_eq!(payload % 4, (len + len % 4) % 4, "len {len}");
            assert_eq!(usize::from(size), 5 + payload);
        }
    }

    #[test]
    fn align_descriptor_lengths() {
        for len in [0usize, 1, 2, 3, 4, 5, 8, 255] {
            let (size, length, payload) = string_size(SchemaVersion::V2, &vec![b'x'; len]);
            assert_eq!(length, len as u64);
            assert!(payload >= len && payload < len + 4, "len {len}");
            assert_eq!((5 + payload) % 4, 0, "len {len}");
            assert_eq!(size % 4, 0);
        }
    }

    #[test]
    fn empty_string_is_valid() {
        assert_eq!(string_size(SchemaVersion::V1, b""), (5, 0, 0));
        assert_eq!(string_size(SchemaVersion::V3, b""), (8, 0, 3));
    }

    #[test]
    fn overlong_string_overflows() {
        let mut m = with_singleton(SchemaVersion::V1);
        m.add(DescriptorKind::String, "long", Fields::new().with("string", vec![b'y'; 256]))
            .unwrap();
        let err = resolve(m).unwrap_err();
        assert!(matches!(
            err,
            CompileError::EncodingOverflow(EncodingOverflowError::StringTooLong { len: 256, .. })
        ));
    }

    #[test]
    fn missing_singleton_is_rejected() {
        let mut m = new_manifest(SchemaVersion::V2);
        m.add(DescriptorKind::Bundle, "b", Fields::new()).unwrap();
        let err = resolve(m).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Configuration(ConfigurationError::MissingSingleton(
                DescriptorKind::Interface
            ))
        ));
    }

    #[test]
    fn total_beyond_u16_overflows() {
        let mut m = with_singleton(SchemaVersion::V1);
        // 256 * (5 + 255 + 3) = 67328 bytes of strings
        for i in 0..256u32 {
            m.add(
                DescriptorKind::String,
                format!("s{i:03}"),
                Fields::new().with("string", vec![b'z'; 255]),
            )
            .unwrap();
        }
        let err = resolve(m).unwrap_err();
        assert!(matches!(
            err,
            CompileError::EncodingOverflow(EncodingOverflowError::ManifestTooLarge { .. })
        ));
    }

    #[test]
    fn resolving_copies_of_one_model_agrees() {
        let mut m = with_singleton(SchemaVersion::V0);
        m.add(DescriptorKind::Function, "f", Fields::new().with("cport", 3u16))
            .unwrap();
        m.add(DescriptorKind::String, "s", Fields::new().with("string", "abc"))
            .unwrap();

        let first = resolve(m.clone()).unwrap();
        let second = resolve(m).unwrap();
        assert_eq!(first.header(), second.header());
        assert_eq!(
            first.iter().collect::<Vec<_>>(),
            second.iter().collect::<Vec<_>>()
        );
        // 4 + 19 + 6 + (5 + 3 + 3)
        assert_eq!(first.header().total_size, 40);
    }

    #[test]
    fn iter_follows_write_order() {
        let mut m = with_singleton(SchemaVersion::V0);
        m.add(DescriptorKind::Cport, "c", Fields::new()).unwrap();
        m.add(DescriptorKind::String, "s", Fields::new()).unwrap();
        m.add(DescriptorKind::Function, "f", Fields::new()).unwrap();
        let r = resolve(m).unwrap();
        let kinds: Vec<_> = r.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            [
                DescriptorKind::Function,
                DescriptorKind::Module,
                DescriptorKind::Cport,
                DescriptorKind::String
            ]
        );
    }

    #[test]
    fn groups_carry_their_layout() {
        let mut m = with_singleton(SchemaVersion::V3);
        m.add(DescriptorKind::Bundle, "b", Fields::new()).unwrap();
        m.add(DescriptorKind::Cport, "c1", Fields::new()).unwrap();
        m.add(DescriptorKind::Cport, "c2", Fields::new()).unwrap();
        let r = resolve(m).unwrap();

        let groups: Vec<_> = r.groups().map(|(spec, ds)| (spec.kind, spec.type_code, ds.len())).collect();
        assert_eq!(
            groups,
            [
                (DescriptorKind::Interface, 1, 1),
                (DescriptorKind::Cport, 4, 2),
                (DescriptorKind::Bundle, 3, 1)
            ]
        );
        let grouped: usize = r.groups().map(|(_, ds)| ds.len()).sum();
        assert_eq!(grouped, r.iter().count());
        for (spec, ds) in r.groups() {
            assert!(ds.iter().all(|d| d.kind == spec.kind && d.size == spec.base_size()));
        }
    }

    #[test]
    fn header_bytes_are_little_endian() {
        let h = ManifestHeader {
            total_size: 0x0120,
            version_major: 0,
            version_minor: 1,
        };
        assert_eq!(h.to_bytes(), [0x20, 0x01, 0, 1]);
    }
}
