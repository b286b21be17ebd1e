#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use manifesto_core::{DescriptorKind, Fields, SchemaVersion, new_manifest, resolve, serialize};

/// A semi-structured descriptor set so we reach the resolver more often than with pure bytes.
#[derive(Arbitrary, Debug)]
struct DescriptorArb {
    kind: u8,
    name: String,
    fields: Vec<(u8, u64)>,
    string: Option<Vec<u8>>,
}

#[derive(Arbitrary, Debug)]
struct ManifestArb {
    version: u8,
    header: (u8, u8),
    descriptors: Vec<DescriptorArb>,
}

const FIELD_NAMES: &[&str] = &[
    "vendor", "product", "version", "vendor_string_id", "product_string_id", "unique_id",
    "id", "interface", "bundle", "protocol", "class", "cport", "function_type", "length",
];

fuzz_target!(|m: ManifestArb| {
    let version = SchemaVersion::ALL[usize::from(m.version) % SchemaVersion::ALL.len()];
    let mut model = new_manifest(version);
    model.set_header_version(m.header.0, m.header.1);

    for d in m.descriptors {
        let kind = DescriptorKind::ALL[usize::from(d.kind) % DescriptorKind::ALL.len()];
        let mut fields = Fields::new();
        for (name, value) in d.fields {
            fields.insert(FIELD_NAMES[usize::from(name) % FIELD_NAMES.len()], value);
        }
        if let Some(s) = d.string {
            fields.insert("string", s);
        }
        // rejected descriptors are fine; the rest must resolve cleanly
        let _ = model.add(kind, d.name, fields);
    }

    // Expectation: never panic, and a resolved manifest serializes to exactly its size.
    if let Ok(resolved) = resolve(model) {
        let bytes = serialize(&resolved);
        assert_eq!(bytes.len(), usize::from(resolved.header().total_size));
    }
});
