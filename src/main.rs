//! PersonaForge - Hybrid-cost persona generation
//!
//! Main entry point. Drafts personas with a cheap local model, filters
//! them through an LLM judge, and selectively refines rejected drafts with
//! a frontier model under a dollar budget.

mod cli;
mod config;
mod error;
mod judge;
mod loader;
mod logging;
mod pipeline;
mod pricing;
mod provider;
mod types;
mod version;

use std::io::Read as _;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::cli::{Cli, Commands, ConfigSubcommand};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::judge::{EvaluationCriterion, PersonaJudge};
use crate::loader::SourceData;
use crate::logging::LogGuards;
use crate::pipeline::{HybridConfig, HybridPipeline};
use crate::provider::{
    LocalProvider, LocalProviderConfig, OpenAiProvider, OpenAiProviderConfig, ProviderKind,
    ProviderRegistry,
};
use crate::types::PersonaCore;

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // For commands that don't need full logging, use simple setup
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        _ => {}
    }

    let config_path = match &cli.command {
        Commands::Generate { config, .. }
        | Commands::Evaluate { config, .. }
        | Commands::Providers { config } => config.clone(),
        _ => None,
    };

    // Load config (or use defaults)
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging with config settings
    // The guards must be kept alive for the lifetime of the program
    let _log_guards = init_logging_from_config(&config, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting PersonaForge"
    );

    let outcome = match cli.command {
        Commands::Generate {
            input,
            count,
            threshold,
            max_cost,
            local_only,
            output,
            metadata,
            ..
        } => run_generate(
            config, &input, count, threshold, max_cost, local_only, output, &metadata,
        ),
        Commands::Evaluate {
            input,
            criteria,
            threshold,
            ..
        } => run_evaluate(config, &input, &criteria, threshold),
        Commands::Providers { .. } => run_providers(&config),
        Commands::Version | Commands::Config { .. } => unreachable!(),
    };

    if let Err(e) = outcome {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }

    Ok(())
}

/// Initialize logging from configuration
fn init_logging_from_config(config: &AppConfig, verbose: u8, quiet: bool) -> Result<LogGuards> {
    logging::init_logging(&config.logging, verbose, quiet)
}

/// Build the provider registry the given pipeline config needs
fn build_registry(config: &AppConfig, hybrid: &HybridConfig) -> Result<Arc<ProviderRegistry>> {
    let mut kinds = vec![hybrid.local_provider, hybrid.judge_provider];
    if let Some(frontier) = hybrid.frontier_provider {
        kinds.push(frontier);
    }
    kinds.sort_by_key(|k| k.name());
    kinds.dedup();

    let mut registry = ProviderRegistry::new();
    for kind in kinds {
        match kind {
            ProviderKind::Local => {
                let provider = LocalProvider::new(LocalProviderConfig {
                    base_url: config.providers.local.base_url.clone(),
                    timeout_secs: config.providers.local.timeout_secs,
                    max_retries: config.providers.local.max_retries,
                })?;
                registry.register(Arc::new(provider));
            }
            ProviderKind::OpenAi => {
                if config.providers.openai.api_key.is_empty() {
                    warn!("OpenAI API key is not set; hosted calls will be rejected");
                }
                let provider = OpenAiProvider::new(OpenAiProviderConfig {
                    base_url: config.providers.openai.base_url.clone(),
                    api_key: config.providers.openai.api_key.clone(),
                    timeout_secs: config.providers.openai.timeout_secs,
                    max_retries: config.providers.openai.max_retries,
                })?;
                registry.register(Arc::new(provider));
            }
            ProviderKind::Mock => {
                return Err(Error::config_field_invalid(
                    "provider",
                    "The mock provider is only available in tests",
                ));
            }
        }
    }
    Ok(Arc::new(registry))
}

/// Build the async runtime for pipeline commands
fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().min(8))
        .thread_name("personaforge")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))
}

/// Load source data from a path argument ("-" reads stdin)
fn load_source(input: &str) -> Result<SourceData> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(Error::Io)?;
        SourceData::from_text(text)
    } else {
        SourceData::from_path(Path::new(input))
    }
}

/// Run the generate command
#[allow(clippy::too_many_arguments)]
fn run_generate(
    mut config: AppConfig,
    input: &str,
    count: usize,
    threshold: Option<f64>,
    max_cost: Option<f64>,
    local_only: bool,
    output: Option<String>,
    metadata: &[String],
) -> Result<()> {
    // CLI overrides take precedence over file and env settings
    if let Some(threshold) = threshold {
        config.generation.quality_threshold = threshold;
    }
    if let Some(max_cost) = max_cost {
        config.generation.max_cost = Some(max_cost);
    }
    if local_only {
        config.generation.frontier_provider = None;
        config.generation.frontier_model = None;
        config.generation.judge_provider = None;
        config.generation.judge_model = None;
    }

    let metadata = cli::parse_metadata(metadata).map_err(Error::Config)?;
    let hybrid = config.to_hybrid_config()?;
    let registry = build_registry(&config, &hybrid)?;
    let source = load_source(input)?;

    info!(
        input,
        count,
        records = source.records.len(),
        hybrid = hybrid.is_hybrid_mode(),
        "Generating personas"
    );

    let pipeline = HybridPipeline::new(hybrid, registry)?;
    let runtime = build_runtime()?;
    let result = runtime.block_on(pipeline.run_with_metadata(&source, count, metadata))?;

    let json = serde_json::to_string_pretty(&result.to_json()?)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).map_err(|e| Error::IoWrite {
                path: path.clone().into(),
                source: e,
            })?;
            println!(
                "Generated {} personas ({} refined, ${:.4}) -> {}",
                result.persona_count(),
                result.refined_count,
                result.total_cost(),
                path
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Run the evaluate command against an existing persona file
fn run_evaluate(config: AppConfig, input: &str, criteria: &[String], threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::config_field_invalid(
            "threshold",
            format!("threshold must be between 0.0 and 1.0, got {}", threshold),
        ));
    }

    let criteria: Vec<EvaluationCriterion> = if criteria.is_empty() {
        EvaluationCriterion::default_set().to_vec()
    } else {
        criteria
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<_>>>()?
    };

    let personas = load_personas(Path::new(input))?;
    let hybrid = config.to_hybrid_config()?;
    let registry = build_registry(&config, &hybrid)?;
    let provider = registry.get(hybrid.judge_provider)?;
    let judge = PersonaJudge::new(provider, &hybrid.judge_model);

    info!(
        input,
        personas = personas.len(),
        criteria = ?criteria.iter().map(|c| c.name()).collect::<Vec<_>>(),
        "Evaluating personas"
    );

    let runtime = build_runtime()?;
    let results = runtime.block_on(async {
        if criteria.iter().any(|c| c.requires_batch()) {
            judge
                .evaluate_batch(&personas, &criteria)
                .await
                .map(|(results, _)| results)
        } else {
            let mut results = Vec::with_capacity(personas.len());
            for persona in &personas {
                let (result, _) = judge.evaluate(persona, &criteria).await?;
                results.push(result);
            }
            Ok(results)
        }
    })?;

    let report: Vec<serde_json::Value> = personas
        .iter()
        .zip(&results)
        .map(|(persona, result)| {
            serde_json::json!({
                "name": persona.name,
                "overall_score": result.overall_score,
                "passed": result.overall_score >= threshold,
                "criterion_scores": result.criterion_scores,
                "feedback": result.feedback,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Parse a persona file: a JSON object or an array of objects
fn load_personas(path: &Path) -> Result<Vec<PersonaCore>> {
    if !path.exists() {
        return Err(Error::DataNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| Error::DataParse {
        message: format!("{}: {}", path.display(), e),
    })?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        object @ serde_json::Value::Object(_) => vec![object],
        _ => {
            return Err(Error::DataParse {
                message: format!("{}: expected a persona object or array", path.display()),
            })
        }
    };

    let mut personas = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let serde_json::Value::Object(mut map) = item else {
            return Err(Error::DataParse {
                message: format!("Persona {} is not a JSON object", i + 1),
            });
        };
        let name = match map.remove("name") {
            Some(serde_json::Value::String(name)) if !name.trim().is_empty() => name,
            _ => {
                return Err(Error::DataParse {
                    message: format!("Persona {} is missing a name", i + 1),
                })
            }
        };
        let mut core = PersonaCore::new(name, 0, i);
        core.fields = map.into_iter().collect();
        personas.push(core);
    }

    if personas.is_empty() {
        return Err(Error::DataEmpty);
    }
    Ok(personas)
}

/// Run the providers command
fn run_providers(config: &AppConfig) -> Result<()> {
    println!("Configured providers:");
    println!();
    println!(
        "  local    {}  (free, timeout {}s, retries {})",
        config.providers.local.base_url,
        config.providers.local.timeout_secs,
        config.providers.local.max_retries
    );
    println!(
        "  openai   {}  (api key {}, timeout {}s, retries {})",
        config.providers.openai.base_url,
        if config.providers.openai.api_key.is_empty() {
            "not set"
        } else {
            "set"
        },
        config.providers.openai.timeout_secs,
        config.providers.openai.max_retries
    );
    Ok(())
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = AppConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => {
            let path = config.as_deref();
            match AppConfig::load(path) {
                Ok(_) => {
                    println!("Configuration is valid.");
                }
                Err(e) => {
                    eprint!("{}", e.format_for_terminal());
                    std::process::exit(e.exit_code());
                }
            }
        }
    }

    Ok(())
}
