use deepsearch::cli::{Cli, Commands, ConfigAction};
use deepsearch::config::{Config, ConfigValidator};
use deepsearch::decompose::{HttpSequenceGenerator, QueryDecomposer};
use deepsearch::error::{DeepSearchError, Result};
use deepsearch::retrieval::{DeepSearchOrchestrator, ResultSet};
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    let rt = tokio::runtime::Runtime::new().map_err(|e| DeepSearchError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    rt.block_on(run(cli))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "deepsearch=debug"
    } else {
        "deepsearch=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { bind, port } => {
            let mut config = load_config(cli.config)?;
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let orchestrator = DeepSearchOrchestrator::from_config(&config)?;
            deepsearch::server::serve(&config.server, config.search.limit, orchestrator).await
        }
        Commands::Search { query, limit, json } => {
            let config = load_config(cli.config)?;
            let orchestrator = DeepSearchOrchestrator::from_config(&config)?;
            let results = orchestrator.search(&query, limit).await?;
            print_results(&results, json)
        }
        Commands::DeepSearch { query, limit, json } => {
            let config = load_config(cli.config)?;
            let orchestrator = DeepSearchOrchestrator::from_config(&config)?;
            let results = orchestrator.deep_search(&query, limit).await?;
            print_results(&results, json)
        }
        Commands::Decompose { query } => {
            let config = load_config(cli.config)?;
            let generator = HttpSequenceGenerator::new(&config.generator)?;
            let decomposer = QueryDecomposer::new(Arc::new(generator))
                .with_max_new_tokens(config.generator.max_new_tokens);

            let sub_queries = decomposer.decompose(&query).await?;
            if sub_queries.is_empty() {
                println!("No sub-queries produced for: {}", query);
            }
            for (i, sub_query) in sub_queries.iter().enumerate() {
                println!("{}. {}", i + 1, sub_query);
            }
            Ok(())
        }
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn print_results(results: &ResultSet, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(results).map_err(|e| DeepSearchError::Json {
            source: e,
            context: "Failed to serialize results".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results");
        return Ok(());
    }

    for (rank, passage) in results.iter().enumerate() {
        let score = passage
            .score
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string());
        match &passage.source_id {
            Some(source) => println!("{:>2}. [{}] ({})", rank + 1, score, source),
            None => println!("{:>2}. [{}]", rank + 1, score),
        }
        println!("    {}", passage.preview(200));
    }
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| DeepSearchError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DeepSearchError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'deepsearch config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}
