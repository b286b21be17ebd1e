use anyhow::{Context, Result, anyhow, bail};
use manifesto_core::{DescriptorKind, FieldValue, Fields, ManifestModel, SchemaVersion};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

// === Source layout ===
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SourceFile {
    #[serde(default)]
    schema: Option<SchemaVersion>,
    #[serde(default)]
    manifest_header: Option<HeaderSection>,
    // every other top-level table is a `<kind>-descriptor` section
    #[serde(flatten)]
    sections: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct HeaderSection {
    version_major: u8,
    version_minor: u8,
}

const SECTION_SUFFIX: &str = "-descriptor";

/// A parsed manifest source, ready for resolution.
#[derive(Debug)]
pub struct Source {
    pub schema: SchemaVersion,
    pub model: ManifestModel,
}

pub fn read_source<P: AsRef<Path>>(path: P, schema: Option<SchemaVersion>) -> Result<Source> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read manifest source at {:?}", path))?;
    parse_source(&bytes, schema).with_context(|| format!("in {}", path.display()))
}

/// Parse a TOML manifest source into a descriptor model.
///
/// `schema` overrides the source's own `schema` key; without either the
/// default schema is used.
pub fn parse_source(bytes: &[u8], schema: Option<SchemaVersion>) -> Result<Source> {
    if bytes.is_empty() || bytes.iter().all(|b| b.is_ascii_whitespace()) {
        bail!("Manifest source is empty");
    }

    let s = std::str::from_utf8(bytes).context("Manifest source is not valid UTF-8")?;

    let file: SourceFile = toml::from_str(s)
        .context("Manifest source TOML is invalid or does not match the expected layout")?;

    let version = match (schema, file.schema) {
        (Some(wanted), Some(declared)) if wanted != declared => {
            log::warn!("source declares schema {declared}, compiling as {wanted}");
            wanted
        }
        (Some(wanted), _) => wanted,
        (None, Some(declared)) => declared,
        (None, None) => SchemaVersion::default(),
    };

    let mut model = ManifestModel::new(version);
    if let Some(header) = file.manifest_header {
        model.set_header_version(header.version_major, header.version_minor);
    }

    for (section, value) in &file.sections {
        add_section(&mut model, section, value)?;
    }

    log::debug!(
        "parsed {} descriptor(s) for schema {version}",
        model.len()
    );
    Ok(Source {
        schema: version,
        model,
    })
}

fn add_section(model: &mut ManifestModel, section: &str, value: &toml::Value) -> Result<()> {
    let kind = section
        .strip_suffix(SECTION_SUFFIX)
        .ok_or_else(|| anyhow!("Unknown section [{section}]"))?;
    let kind: DescriptorKind = kind
        .parse()
        .with_context(|| format!("Unknown section [{section}]"))?;
    let spec = model
        .schema()
        .kind(kind)
        .with_context(|| format!("Section [{section}]"))?;
    let table = value
        .as_table()
        .ok_or_else(|| anyhow!("Section [{section}] must be a table"))?;

    if spec.singleton {
        let fields = fields_from(section, table)?;
        model
            .add(kind, kind.as_str(), fields)
            .with_context(|| format!("Section [{section}]"))?;
        return Ok(());
    }

    if table.is_empty() {
        log::warn!("section [{section}] holds no descriptors");
    }
    for (name, body) in table {
        let at = format!("{section}.{name}");
        let body = body
            .as_table()
            .ok_or_else(|| anyhow!("Section [{at}] must be a table"))?;
        let fields = fields_from(&at, body)?;
        model
            .add(kind, name.clone(), fields)
            .with_context(|| format!("Section [{at}]"))?;
    }
    Ok(())
}

fn fields_from(at: &str, table: &toml::Table) -> Result<Fields> {
    let mut fields = Fields::new();
    for (key, value) in table {
        let value = match value {
            toml::Value::Integer(i) => FieldValue::Int(
                u64::try_from(*i)
                    .map_err(|_| anyhow!("[{at}] {key} = {i}: values must not be negative"))?,
            ),
            toml::Value::String(s) => FieldValue::from(s.as_str()),
            other => bail!(
                "[{at}] {key}: expected an integer or a string, found {}",
                other.type_str()
            ),
        };
        let field = key.replace('-', "_");
        if fields.insert(field.as_str(), value).is_some() {
            bail!("[{at}] sets `{field}` more than once");
        }
    }
    Ok(fields)
}
