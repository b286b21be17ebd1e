//! Byte emission for resolved manifests.
//!
//! The stream is the 4-byte header followed by every descriptor group in the
//! schema's write order. There are no counts or delimiters: a reader walks the
//! stream using each descriptor's leading size field alone.

use crate::error::CompileError;
use crate::resolve::{ResolvedDescriptor, ResolvedManifest};
use crate::schema::KindSpec;
use std::io::Write;

pub fn serialize(manifest: &ResolvedManifest) -> Vec<u8> {
    let header = manifest.header();

    let mut buf = Vec::with_capacity(usize::from(header.total_size));
    buf.extend(&header.to_bytes());

    for (spec, descriptors) in manifest.groups() {
        log::debug!("writing {} {} descriptor(s)", descriptors.len(), spec.kind);
        for descriptor in descriptors {
            encode_descriptor(&mut buf, spec, descriptor);
        }
    }

    debug_assert_eq!(buf.len(), usize::from(header.total_size));
    buf
}

/// Serialize and write the whole manifest to `sink`, then flush it.
pub fn write_to<W: Write>(manifest: &ResolvedManifest, mut sink: W) -> Result<(), CompileError> {
    sink.write_all(&serialize(manifest))?;
    sink.flush()?;
    Ok(())
}

fn encode_descriptor(buf: &mut Vec<u8>, spec: &KindSpec, descriptor: &ResolvedDescriptor) {
    buf.extend(&descriptor.size.to_le_bytes());
    buf.push(descriptor.type_code);
    for (field, value) in spec.fields.iter().zip(&descriptor.values) {
        field.width.put(buf, *value);
    }
    buf.extend(&descriptor.payload);
}
