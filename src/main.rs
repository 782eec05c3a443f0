use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use revlink::config::Config;
use revlink::io::{create_sink, open_source};
use revlink::pipeline;
use revlink::resolver::{CanonicalMap, KeyMap};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "revlink")]
#[command(version, about = "Entity signal mining from wiki revision dumps", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = "revlink.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract anchor records from JSON revision lines
    Anchors {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Extract the distinct title/page-id dictionary from JSON revision lines
    Titles {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Keep only revisions inside the sampling window
    Sample {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
        /// Window start (RFC 3339), overrides the config
        #[arg(long)]
        begin: Option<String>,
        /// Window end, exclusive (RFC 3339), overrides the config
        #[arg(long)]
        end: Option<String>,
    },

    /// Fix anchor lines whose timestamp and source id were written fused
    RepairAnchors {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Resolve dictionary titles through redirects into a canonical mapping
    Resolve {
        #[arg(long)]
        dictionary: PathBuf,
        #[arg(long)]
        redirects: PathBuf,
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
        /// Alias edges to follow from a request target, overrides the config
        #[arg(long)]
        max_hops: Option<usize>,
    },

    /// Re-key a title-keyed time series by canonical id (inner join)
    Join {
        #[arg(short, long, default_value = "-")]
        series: PathBuf,
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
        /// Canonical mapping written by `resolve`
        #[arg(long, conflicts_with = "dictionary", required_unless_present = "dictionary")]
        mapping: Option<PathBuf>,
        /// Plain title/id dictionary
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Redirects to resolve against the dictionary before joining
        #[arg(long, requires = "dictionary")]
        redirects: Option<PathBuf>,
        /// Counts per row, overrides the config
        #[arg(long)]
        months: Option<usize>,
    },

    /// Sum id-keyed time series rows per id
    Aggregate {
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
        /// Counts per row, overrides the config
        #[arg(long)]
        months: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Anchors { input, output } => {
            let mut sink = create_sink(&output)?;
            pipeline::extract_anchors(open_source(&input)?, &mut sink)?;
        }
        Commands::Titles { input, output } => {
            let mut sink = create_sink(&output)?;
            pipeline::extract_titles(open_source(&input)?, &mut sink)?;
        }
        Commands::Sample {
            input,
            output,
            begin,
            end,
        } => {
            if let Some(begin) = begin {
                config.sample.begin = begin;
            }
            if let Some(end) = end {
                config.sample.end = end;
            }
            config.validate()?;
            let window = config.sample_window()?;
            let mut sink = create_sink(&output)?;
            pipeline::sample_revisions(open_source(&input)?, window, &mut sink)?;
        }
        Commands::RepairAnchors { input, output } => {
            let mut sink = create_sink(&output)?;
            pipeline::repair_anchors(open_source(&input)?, &mut sink)?;
        }
        Commands::Resolve {
            dictionary,
            redirects,
            output,
            max_hops,
        } => {
            if let Some(hops) = max_hops {
                config.max_alias_hops = hops;
            }
            config.validate()?;
            let mut sink = create_sink(&output)?;
            pipeline::resolve_redirects(
                open_source(&dictionary)?,
                open_source(&redirects)?,
                config.max_alias_hops,
                &mut sink,
            )?;
        }
        Commands::Join {
            series,
            output,
            mapping,
            dictionary,
            redirects,
            months,
        } => {
            if let Some(m) = months {
                config.month_count = m;
            }
            config.validate()?;
            let key_map = load_key_map(
                mapping.as_deref(),
                dictionary.as_deref(),
                redirects.as_deref(),
                config.max_alias_hops,
            )?;
            let mut sink = create_sink(&output)?;
            pipeline::join_series(
                open_source(&series)?,
                &*key_map,
                config.month_count,
                &mut sink,
            )?;
        }
        Commands::Aggregate {
            input,
            output,
            months,
        } => {
            if let Some(m) = months {
                config.month_count = m;
            }
            config.validate()?;
            let mut sink = create_sink(&output)?;
            pipeline::aggregate_series(open_source(&input)?, config.month_count, &mut sink)?;
        }
    }

    Ok(())
}

/// Pick the join key map from whichever inputs were given.
fn load_key_map(
    mapping: Option<&Path>,
    dictionary: Option<&Path>,
    redirects: Option<&Path>,
    max_hops: usize,
) -> Result<Box<dyn KeyMap>> {
    match (mapping, dictionary, redirects) {
        (Some(mapping), _, _) => {
            let map = CanonicalMap::load(open_source(mapping)?)
                .with_context(|| format!("failed to read mapping: {}", mapping.display()))?;
            info!("Loaded canonical mapping with {} titles", map.len());
            Ok(Box::new(map))
        }
        (None, Some(dictionary), Some(redirects)) => {
            let map = pipeline::build_canonical_map(
                open_source(dictionary)?,
                open_source(redirects)?,
                max_hops,
            )?;
            info!("Built canonical map with {} titles", map.len());
            Ok(Box::new(map))
        }
        (None, Some(dictionary), None) => {
            // No redirect edges: the map only normalizes dictionary titles.
            let map =
                pipeline::build_canonical_map(open_source(dictionary)?, io::empty(), max_hops)?;
            info!("Loaded dictionary with {} titles", map.len());
            Ok(Box::new(map))
        }
        (None, None, _) => anyhow::bail!("join needs --mapping or --dictionary"),
    }
}
