use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jsonschema_ts_core::{compile_document, compile_with_fetcher, CompileOptions, SchemaFetcher};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "jsonschema-ts")]
#[command(about = "Compile JSON Schema documents into TypeScript declarations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema and write the declarations
    Compile {
        #[command(flatten)]
        args: CompileArgs,

        /// Output file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the whole pipeline and report errors without writing output
    Check {
        #[command(flatten)]
        args: CompileArgs,
    },
}

#[derive(Args)]
struct CompileArgs {
    /// Input JSON Schema file
    input: PathBuf,

    /// Root type name (defaults to the input file stem)
    #[arg(short, long)]
    name: Option<String>,

    /// Treat the input as a document of named entries
    #[arg(long, conflicts_with = "name")]
    document: bool,

    /// JSON file with compile options (kebab-case keys)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use `any` instead of `unknown` as the placeholder type
    #[arg(long)]
    any: bool,

    /// Ignore minItems/maxItems instead of emitting tuples
    #[arg(long)]
    ignore_min_and_max_items: bool,

    /// Largest maxItems - minItems expanded into tuples (-1 for no cap)
    #[arg(long, allow_hyphen_values = true)]
    max_items: Option<i64>,

    /// Append `| undefined` to index signatures
    #[arg(long)]
    strict_index_signatures: bool,

    /// Keep definitions that are not reachable from the root
    #[arg(long)]
    unreachable_definitions: bool,
}

/// Reads `file:` references from disk.
struct FileFetcher;

impl SchemaFetcher for FileFetcher {
    fn fetch(&self, uri: &Url) -> std::result::Result<Value, String> {
        if uri.scheme() != "file" {
            return Err(format!("unsupported scheme `{}`", uri.scheme()));
        }
        let path = uri
            .to_file_path()
            .map_err(|_| format!("not a local path: {uri}"))?;
        let file = File::open(&path).map_err(|e| format!("{}: {e}", path.display()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| format!("{}: {e}", path.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for the declarations
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compile { args, output } => {
            let text = run(&args)?;
            write_output(&text, output.as_deref())?;
        }
        Commands::Check { args } => {
            run(&args)?;
            eprintln!("{}: ok", args.input.display());
        }
    }

    Ok(())
}

fn run(args: &CompileArgs) -> Result<String> {
    let schema = read_json(&args.input, "schema")?;
    let options = build_options(args)?;

    let result = if args.document {
        compile_document(&schema, &options, &FileFetcher)
    } else {
        let name = match &args.name {
            Some(name) => name.clone(),
            None => args
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .context("Cannot derive a root name from the input path, pass --name")?,
        };
        compile_with_fetcher(&schema, &name, &options, &FileFetcher)
    };

    result.map_err(|e| {
        anyhow::Error::from(e).context(format!("Compilation of {} failed", args.input.display()))
    })
}

fn build_options(args: &CompileArgs) -> Result<CompileOptions> {
    let mut options: CompileOptions = match &args.config {
        Some(path) => serde_json::from_value(read_json(path, "config")?)
            .with_context(|| format!("Invalid options in {}", path.display()))?,
        None => CompileOptions::default(),
    };

    if args.any {
        options.unknown_any = false;
    }
    if args.ignore_min_and_max_items {
        options.ignore_min_and_max_items = true;
    }
    if let Some(max_items) = args.max_items {
        options.max_items = max_items;
    }
    if args.strict_index_signatures {
        options.strict_index_signatures = true;
    }
    if args.unreachable_definitions {
        options.unreachable_definitions = true;
    }
    if options.base_uri.is_none() {
        options.base_uri = Some(base_uri_for(&args.input)?.to_string());
    }
    Ok(options)
}

/// External references resolve relative to the input file.
fn base_uri_for(input: &Path) -> Result<Url> {
    let absolute = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
    Url::from_file_path(&absolute)
        .map_err(|_| anyhow::anyhow!("Input path is not absolute: {}", absolute.display()))
}

fn read_json(path: &Path, what: &str) -> Result<Value> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {what} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {what} from: {}", path.display()))
}

fn write_output(text: &str, path: Option<&Path>) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p)
            .with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    writer
        .write_all(text.as_bytes())
        .context("Failed to write declarations")?;
    writer.flush().context("Failed to flush output")?;
    tracing::debug!(bytes = text.len(), "output written");
    Ok(())
}
