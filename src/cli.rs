use crate::client::ClientTarget;
use crate::config::MapperConfig;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use std::path::PathBuf;

/// Type Graph Mapper - resolve mappers for an annotated Rust model and report them
#[derive(Parser, Debug)]
#[command(name = "typegraph-mapper")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Directory holding the model source files
    #[arg(value_name = "MODEL_PATH")]
    pub model_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Client language to derive type names for (repeatable; overrides the config file)
    #[arg(short = 't', long = "target", value_enum)]
    pub targets: Vec<ClientTarget>,

    /// YAML configuration file
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Skip types that fail to resolve instead of aborting
    #[arg(long = "keep-going")]
    pub keep_going: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.model_path.exists() {
        anyhow::bail!("Model path does not exist: {}", args.model_path.display());
    }
    if !args.model_path.is_dir() {
        anyhow::bail!("Model path is not a directory: {}", args.model_path.display());
    }
    if let Some(config) = &args.config_path {
        if !config.is_file() {
            anyhow::bail!("Config file does not exist: {}", config.display());
        }
    }

    info!("Model path: {}", args.model_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Settings from the config file with command-line overrides applied
pub fn effective_config(args: &CliArgs) -> Result<MapperConfig> {
    let mut config = match &args.config_path {
        Some(path) => MapperConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => MapperConfig::default(),
    };
    if !args.targets.is_empty() {
        config.targets = args.targets.clone();
    }
    config.keep_going |= args.keep_going;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::model::loader::ModelLoader;
    use crate::parser::SourceParser;
    use crate::report::ReportBuilder;
    use crate::resolver::Resolver;
    use crate::scanner::SourceScanner;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
    use std::sync::Arc;

    let config = effective_config(&args)?;
    info!("Direction: {:?}, targets: {:?}", config.direction, config.targets);

    info!("Scanning model directory...");
    let scan_result = SourceScanner::new(args.model_path.clone()).scan()?;
    for warning in &scan_result.warnings {
        log::warn!("{}", warning);
    }
    if scan_result.source_files.is_empty() {
        anyhow::bail!("No Rust files found in the model directory");
    }
    info!("Found {} model files", scan_result.source_files.len());

    info!("Parsing model files...");
    let parsed_files = SourceParser::parse_files(&scan_result.source_files);
    if parsed_files.is_empty() {
        anyhow::bail!("No model files could be parsed successfully");
    }

    info!("Loading type model...");
    let model = ModelLoader::load(&parsed_files).context("Failed to load the type model")?;
    info!(
        "Loaded {} types and {} global declarations",
        model.types().count(),
        model.globals().len()
    );

    info!("Resolving mappers...");
    let resolver = Resolver::with_direction(Arc::new(model), config.direction);
    let report = ReportBuilder::new(&resolver, &config)
        .build()
        .context("Failed to resolve the model")?;

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&report)?,
        OutputFormat::Json => serialize_json(&report)?,
    };

    if let Some(output_path) = &args.output_path {
        write_to_file(&content, output_path)?;
        info!("Wrote mapping report to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    info!("Summary:");
    info!("  - Files scanned: {}", scan_result.source_files.len());
    info!("  - Files parsed: {}", parsed_files.len());
    info!("  - Types reported: {}", report.types.len());
    info!("  - Mappers resolved: {}", resolver.len());

    Ok(())
}
