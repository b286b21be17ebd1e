#![forbid(unsafe_code)]
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use manifesto::compile::{CompileOptions, compile};
use manifesto::schemas::print_schemas;
use manifesto_core::SchemaVersion;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "manifesto", version, author)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a manifest source into a binary .mnfb manifest
    Compile {
        #[arg(short, long)]
        input: PathBuf,
        /// Defaults to the input path with a .mnfb extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Wire format version (v0, v1, v2, v3); overrides the source's `schema` key
        #[arg(short, long, env = "MANIFESTO_SCHEMA")]
        schema: Option<SchemaVersion>,
    },
    /// List the supported wire format versions
    Schemas,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .filter_level(cli.verbose.log_level_filter())
        .init();

    match cli.command {
        Commands::Compile {
            input,
            output,
            schema,
        } => {
            let output = compile(CompileOptions {
                input,
                output,
                schema,
            })?;
            println!("Created manifest at {}", output.display());
        }
        Commands::Schemas => print_schemas(),
    }

    Ok(())
}
