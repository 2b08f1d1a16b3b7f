use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use spangen::codegen::{
    write_templates, CodeGenConfig, CodeGenerator, CommandFormatter, GoGenerator, ModuleRegistry,
    NoopFormatter, DEFAULT_SUFFIX,
};
use spangen::config::{load_inflection_rules, CatalogConfig, CustomTypes};
use spangen::introspect::{CatalogSource, DdlSource, GcloudClient, SchemaSource, TableFilter};
use spangen::loader::SchemaLoader;
use spangen::naming::Inflector;
use spangen::schema::Schema;

#[derive(Parser, Debug)]
#[command(name = "spangen")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate Go code from a Spanner schema
    Generate(GenerateArgs),
    /// Write the built-in templates to a directory for customization
    CreateTemplate {
        /// Directory to write the templates into
        #[arg(long)]
        template_path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// PROJECT INSTANCE DATABASE of a live database (default: from the environment)
    #[arg(value_name = "NAME", conflicts_with = "from_ddl")]
    database: Vec<String>,

    /// Read the schema from a DDL file instead of a live database
    #[arg(long, value_name = "FILE")]
    from_ddl: Option<PathBuf>,

    /// Output directory, or a .go file for single file output
    #[arg(short, long, default_value = "./models")]
    out: PathBuf,

    /// Output file suffix
    #[arg(long, default_value = DEFAULT_SUFFIX)]
    suffix: String,

    /// Go package name (default: the output directory name)
    #[arg(long)]
    package: Option<String>,

    /// YAML file mapping table columns to custom Go types
    #[arg(long)]
    custom_types_file: Option<PathBuf>,

    /// Package qualifying custom types that carry no package
    #[arg(long, default_value = "")]
    custom_type_package: String,

    /// Columns to skip, as `Column` or `Table.Column`
    #[arg(long, value_delimiter = ',')]
    ignore_fields: Vec<String>,

    /// Tables to skip
    #[arg(long, value_delimiter = ',')]
    ignore_tables: Vec<String>,

    /// Directory of template overrides
    #[arg(long)]
    template_path: Option<PathBuf>,

    /// Build tags for the generated files
    #[arg(long, default_value = "")]
    tags: String,

    /// YAML file of extra singular/plural pairs
    #[arg(long)]
    inflection_rule_file: Option<PathBuf>,

    /// Formatter command reading Go source on stdin ("none" to disable)
    #[arg(long, default_value = "gofmt")]
    formatter: String,

    /// Path to .env file for connection config
    #[arg(long, default_value = "./.env")]
    env_file: PathBuf,
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "Fatal error");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("spangen v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Generate(args) => generate(args),
        Command::CreateTemplate { template_path } => {
            let written = write_templates(&template_path)
                .with_context(|| format!("Failed to write templates to {}", template_path.display()))?;
            for path in &written {
                debug!(path = ?path, "Template");
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn generate(args: GenerateArgs) -> Result<()> {
    info!(
        out = ?args.out,
        from_ddl = ?args.from_ddl,
        template_path = ?args.template_path,
        "Starting code generation"
    );

    let rules = match &args.inflection_rule_file {
        Some(path) => load_inflection_rules(path).context("Failed to load inflection rules")?,
        None => Vec::new(),
    };
    let inflector = Arc::new(Inflector::new(&rules));

    let custom_types = match &args.custom_types_file {
        Some(path) => CustomTypes::load(path).context("Failed to load custom types")?,
        None => CustomTypes::default(),
    };

    let filter = TableFilter {
        ignore_tables: args.ignore_tables.iter().cloned().collect(),
        ignore_fields: args.ignore_fields.iter().cloned().collect(),
    };
    debug!(filter = ?filter, "Table filter");

    let schema = match &args.from_ddl {
        Some(path) => {
            info!(file = ?path, "Reading DDL");
            let mut source = DdlSource::from_file(path).context("Failed to read DDL")?;
            load_schema(&mut source, &inflector, filter, custom_types)?
        }
        None => {
            let config = CatalogConfig::resolve(&args.database, &args.env_file)
                .context("Failed to resolve database")?;
            info!(database = ?config.database_path(), "Reading catalog");
            let mut client = GcloudClient::new(config);
            let mut source = CatalogSource::new(&mut client);
            load_schema(&mut source, &inflector, filter, custom_types)?
        }
    };

    if schema.types.is_empty() {
        bail!("No tables found to generate code for");
    }
    for typ in &schema.types {
        debug!(
            type_name = ?typ.name,
            table = ?typ.table_name,
            fields = ?typ.fields.len(),
            indexes = ?typ.indexes.len(),
            "Type"
        );
    }

    let mut codegen_config = CodeGenConfig::new(args.out.clone())
        .with_suffix(&args.suffix)
        .with_build_tag(&args.tags)
        .with_custom_type_package(&args.custom_type_package);
    if let Some(package) = &args.package {
        codegen_config = codegen_config.with_package(package);
    }
    debug!(codegen_config = ?codegen_config, "Code generation config");

    let modules = match &args.template_path {
        Some(dir) => ModuleRegistry::with_overrides(dir).context("Failed to load templates")?,
        None => ModuleRegistry::builtin(),
    };

    let generator = match CommandFormatter::from_command_line(&args.formatter) {
        Some(formatter) => GoGenerator::new(modules, inflector).with_formatter(Box::new(formatter)),
        None => GoGenerator::new(modules, inflector).with_formatter(Box::new(NoopFormatter)),
    };

    let written = generator
        .generate(&schema, &codegen_config)
        .context("Code generation failed")?;

    info!(files = ?written.len(), out = ?args.out, "Code generation complete");
    Ok(())
}

fn load_schema(
    source: &mut dyn SchemaSource,
    inflector: &Inflector,
    filter: TableFilter,
    custom_types: CustomTypes,
) -> Result<Schema> {
    SchemaLoader::new(source, inflector)
        .with_filter(filter)
        .with_custom_types(custom_types)
        .load_schema()
        .context("Failed to load schema")
}
