//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// PersonaForge - Hybrid-cost persona generation
///
/// Drafts user-research personas with a cheap local model, filters them
/// through an LLM judge, and refines only the drafts that fall short using
/// a frontier model, under a per-run dollar budget.
#[derive(Parser, Debug)]
#[command(name = "personaforge")]
#[command(author, version, long_about = None)]
#[command(about = "PersonaForge - Hybrid-cost persona generation")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate personas from research data
    Generate {
        /// Research data: a file, a directory of .txt/.md/.json files, or
        /// "-" to read from stdin
        input: String,

        /// Number of personas to generate
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Path to configuration file
        #[arg(short, long, env = "PERSONAFORGE_CONFIG")]
        config: Option<String>,

        /// Override the quality threshold (0.0 - 1.0)
        #[arg(long)]
        threshold: Option<f64>,

        /// Override the dollar budget for this run
        #[arg(long)]
        max_cost: Option<f64>,

        /// Skip the judge and frontier model entirely
        #[arg(long)]
        local_only: bool,

        /// Write the full result JSON to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Attach metadata to the result (repeatable, key=value)
        #[arg(long = "metadata", value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },

    /// Evaluate an existing persona file without generating anything
    Evaluate {
        /// JSON file containing a persona object or an array of them
        input: String,

        /// Criteria to score (default: coherence, realism, usefulness)
        #[arg(long, value_delimiter = ',')]
        criteria: Vec<String>,

        /// Pass/fail threshold to report against
        #[arg(long, default_value = "0.7")]
        threshold: f64,

        /// Path to configuration file
        #[arg(short, long, env = "PERSONAFORGE_CONFIG")]
        config: Option<String>,
    },

    /// List configured providers and their status
    Providers {
        /// Path to configuration file
        #[arg(short, long, env = "PERSONAFORGE_CONFIG")]
        config: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

/// Parse repeated key=value metadata flags into a JSON map
pub fn parse_metadata(pairs: &[String]) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    let mut map = serde_json::Map::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                map.insert(
                    key.to_string(),
                    serde_json::Value::String(value.to_string()),
                );
            }
            _ => return Err(format!("Invalid metadata '{}', expected key=value", pair)),
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Verifies that the CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_shows_branding() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("PersonaForge"));
    }

    #[test]
    fn test_generate_defaults() {
        let cli = Cli::parse_from(["personaforge", "generate", "notes.txt"]);
        match cli.command {
            Commands::Generate {
                input,
                count,
                threshold,
                max_cost,
                local_only,
                ..
            } => {
                assert_eq!(input, "notes.txt");
                assert_eq!(count, 5);
                assert!(threshold.is_none());
                assert!(max_cost.is_none());
                assert!(!local_only);
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_generate_with_options() {
        let cli = Cli::parse_from([
            "personaforge",
            "generate",
            "data/",
            "-n",
            "10",
            "--threshold",
            "0.8",
            "--max-cost",
            "2.5",
            "--local-only",
            "--output",
            "result.json",
        ]);
        match cli.command {
            Commands::Generate {
                count,
                threshold,
                max_cost,
                local_only,
                output,
                ..
            } => {
                assert_eq!(count, 10);
                assert_eq!(threshold, Some(0.8));
                assert_eq!(max_cost, Some(2.5));
                assert!(local_only);
                assert_eq!(output, Some("result.json".to_string()));
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_generate_metadata() {
        let cli = Cli::parse_from([
            "personaforge",
            "generate",
            "notes.txt",
            "--metadata",
            "project=alpha",
            "--metadata",
            "run=nightly",
        ]);
        match cli.command {
            Commands::Generate { metadata, .. } => {
                let map = parse_metadata(&metadata).unwrap();
                assert_eq!(map["project"], "alpha");
                assert_eq!(map["run"], "nightly");
            }
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_parse_metadata_rejects_bare_key() {
        assert!(parse_metadata(&["nodelimiter".to_string()]).is_err());
        assert!(parse_metadata(&["=value".to_string()]).is_err());
    }

    #[test]
    fn test_evaluate_criteria_list() {
        let cli = Cli::parse_from([
            "personaforge",
            "evaluate",
            "personas.json",
            "--criteria",
            "coherence,specificity",
        ]);
        match cli.command {
            Commands::Evaluate { criteria, threshold, .. } => {
                assert_eq!(criteria, vec!["coherence", "specificity"]);
                assert_eq!(threshold, 0.7);
            }
            _ => panic!("Expected Evaluate command"),
        }
    }

    #[test]
    fn test_providers_command() {
        let cli = Cli::parse_from(["personaforge", "providers"]);
        assert!(matches!(cli.command, Commands::Providers { .. }));
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["personaforge", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::parse_from(["personaforge", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["personaforge", "config", "show"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Show { config },
            } => assert!(config.is_none()),
            _ => panic!("Expected Config Show command"),
        }
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["personaforge", "config", "init", "--force"]);
        match cli.command {
            Commands::Config {
                subcommand: ConfigSubcommand::Init { path, force },
            } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
