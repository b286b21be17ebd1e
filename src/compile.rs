use crate::source::{parse_source, read_source};
use anyhow::{Context, Result, bail};
use manifesto_core::{SchemaVersion, resolve, serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extension of compiled manifests.
pub const OUTPUT_EXTENSION: &str = "mnfb";

/// Options for the `manifesto compile` subcommand
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub input: PathBuf,
    /// Defaults to the input path with a `.mnfb` extension.
    pub output: Option<PathBuf>,
    pub schema: Option<SchemaVersion>,
}

pub fn default_output(input: &Path) -> PathBuf {
    input.with_extension(OUTPUT_EXTENSION)
}

/// Compile source text to manifest bytes without touching the filesystem.
pub fn compile_bytes(source: &[u8], schema: Option<SchemaVersion>) -> Result<Vec<u8>> {
    let source = parse_source(source, schema)?;
    let resolved = resolve(source.model).context("Failed to compile manifest")?;
    Ok(serialize(&resolved))
}

/// Compile a source file and write the binary manifest. Returns the output path.
///
/// The output file is only created once the whole manifest has been built, so
/// a failed compile never leaves a truncated blob behind.
pub fn compile(opts: CompileOptions) -> Result<PathBuf> {
    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| default_output(&opts.input));
    if output == opts.input {
        bail!("Output {:?} would overwrite the manifest source", output);
    }

    let source = read_source(&opts.input, opts.schema)?;
    let version = source.schema;
    let descriptors = source.model.len();
    let resolved = resolve(source.model)
        .with_context(|| format!("Failed to compile {:?}", opts.input))?;
    let bytes = serialize(&resolved);

    let mut file = File::create(&output)
        .with_context(|| format!("Failed to create manifest at {:?}", output))?;
    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .with_context(|| format!("Failed to write manifest at {:?}", output))?;

    log::info!(
        "compiled {} descriptor(s) with schema {version} into {} bytes",
        descriptors,
        bytes.len()
    );
    Ok(output)
}
