use manifesto_core::{Schema, SchemaVersion};

/// Human-readable summary of one registered wire format.
pub fn describe(schema: &Schema) -> String {
    let (major, minor) = schema.header_version;
    let mut lines = vec![
        format!("schema {} ({})", schema.version, schema.summary),
        format!("  header version: {major}.{minor}"),
        format!("  string padding: {}", schema.padding),
    ];

    for spec in schema.kinds {
        let fields: Vec<_> = spec
            .fields
            .iter()
            .map(|f| format!("{}: {}", f.name, f.width))
            .collect();
        lines.push(format!(
            "  {:<9} type {} size {:>2}{}  [{}]",
            spec.kind.as_str(),
            spec.type_code,
            spec.base_size(),
            if spec.has_payload() { "+" } else { " " },
            fields.join(", ")
        ));
    }

    let order: Vec<_> = schema.write_order.iter().map(|k| k.as_str()).collect();
    lines.push(format!("  write order: {}", order.join(", ")));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn print_schemas() {
    for version in SchemaVersion::ALL {
        println!("{}", describe(version.schema()));
    }
}
