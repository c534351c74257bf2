mod cli;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, GenerateArgs};
use mediaslots::config::{Config, ConfigError};
use mediaslots::generator::{GeminiBackend, GenerationError, GenerationRequest, VariantGenerator};
use mediaslots::manifest::{ClipSeconds, ManifestError, ManifestStore, MediaKind};
use mediaslots::observability::init_tracing;
use mediaslots::resolver::SlotResolver;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("staging server failed: {0}")]
    Server(String),
}

impl CliError {
    fn is_missing_credential(&self) -> bool {
        matches!(
            self,
            CliError::Config(ConfigError::MissingApiKey)
                | CliError::Generation(GenerationError::MissingCredential)
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version print to stdout and succeed
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_missing_credential() => {
            eprintln!("{e}");
            eprintln!("{}", Cli::command().render_usage());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::load_with(cli.config)?;

    match cli.command {
        Commands::Image(args) => generate(&config, MediaKind::Image, args, None).await,
        Commands::Video(args) => {
            generate(&config, MediaKind::Video, args.common, args.duration).await
        }
        Commands::Serve(args) => {
            if let Some(address) = args.address {
                config.staging.bind_addr = address;
            }
            mediaslots::api::run(config)
                .await
                .map_err(|e| CliError::Server(e.to_string()))
        }
        Commands::Resolve(args) => {
            let resolver = SlotResolver::new(open_store(&config, args.kind));
            let fallback = args.fallback.as_deref();
            let resolved = if args.versioned {
                resolver.resolve_versioned(&args.slot, fallback)
            } else {
                resolver.resolve(&args.slot, fallback)
            };
            match resolved {
                Some(path) => println!("{path}"),
                None => eprintln!("No variant resolves for slot '{}'", args.slot),
            }
            Ok(())
        }
        Commands::Slots(args) => {
            let manifest = open_store(&config, args.kind).load()?;
            if manifest.slots.is_empty() {
                println!("No {} slots yet", args.kind);
            }
            for (name, slot) in &manifest.slots {
                println!(
                    "{name:<32} {:>3} files  selected: {}",
                    slot.files.len(),
                    slot.selected.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

async fn generate(
    config: &Config,
    kind: MediaKind,
    args: GenerateArgs,
    duration: Option<ClipSeconds>,
) -> Result<(), CliError> {
    config.require_api_key()?;
    let backend = Arc::new(GeminiBackend::new(&config.api)?);
    let generator = VariantGenerator::new(config, kind, backend, open_store(config, kind));

    let request = GenerationRequest::builder()
        .slot(args.slot)
        .prompt(args.prompt)
        .maybe_count(args.count)
        .maybe_aspect(args.aspect)
        .maybe_duration(duration)
        .maybe_name(args.name)
        .maybe_out_dir(args.out_dir)
        .build();

    let report = generator.generate(request).await?;
    info!(summary = %report.summary(), "Batch finished");

    println!("{}", report.summary());
    for file in &report.files {
        println!("  {}", file.path);
    }
    for failure in &report.failures {
        println!("  failed {}: {}", failure.filename, failure.reason);
    }
    Ok(())
}

fn open_store(config: &Config, kind: MediaKind) -> Arc<ManifestStore> {
    Arc::new(ManifestStore::open_file(kind, config.paths.manifest_for(kind)))
}
