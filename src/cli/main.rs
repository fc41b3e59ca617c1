use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use taskhub_search::config::{Config, ENV_PREFIX};
use taskhub_search::engine::Refresh;
use taskhub_search::index::{BulkOptions, IndexConfig};
use taskhub_search::search::{SearchQuery, SortOrder};
use taskhub_search::SearchOrchestrator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "taskhub-search")]
#[command(about = "TaskHub search operator CLI", version, long_about = None)]
struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(short, long, env = "TASKHUB_SEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cluster or index health
    Health {
        #[arg(short, long)]
        index: Option<String>,
    },

    /// Create an index with safe defaults
    CreateIndex {
        #[arg(value_name = "INDEX")]
        name: String,

        /// JSON file with `settings`, `mappings` and `aliases`; the standard task layout otherwise
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Alias to attach at creation
        #[arg(short, long)]
        alias: Vec<String>,
    },

    /// Delete an index after detaching its aliases
    DeleteIndex {
        #[arg(value_name = "INDEX")]
        name: String,
    },

    /// Rebuild an index and move an alias onto the copy
    Reindex {
        #[arg(value_name = "SOURCE")]
        source: String,

        #[arg(value_name = "ALIAS")]
        alias: String,
    },

    /// Change dynamic index settings
    Settings {
        #[arg(value_name = "INDEX")]
        name: String,

        /// Setting as key=value; values are parsed as JSON when possible
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Ingest documents from a JSON array or NDJSON file
    Bulk {
        #[arg(value_name = "INDEX")]
        index: String,

        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "1000")]
        batch_size: usize,

        #[arg(short, long, value_enum, default_value = "false")]
        refresh: RefreshArg,
    },

    /// Run a search
    Search {
        #[arg(value_name = "INDEX")]
        index: String,

        #[arg(value_name = "QUERY")]
        query: String,

        /// Exact-match filter as field=value
        #[arg(short = 'F', long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,

        #[arg(short, long, default_value = "1")]
        page: u64,

        #[arg(short, long, default_value = "20")]
        limit: u64,

        #[arg(short, long)]
        sort_by: Option<String>,

        #[arg(long, value_enum, default_value = "desc")]
        sort_order: SortArg,

        /// Timeout override such as 750ms or 2s
        #[arg(short, long)]
        timeout: Option<String>,

        #[arg(long)]
        analyzer: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RefreshArg {
    False,
    True,
    WaitFor,
}

impl From<RefreshArg> for Refresh {
    fn from(arg: RefreshArg) -> Self {
        match arg {
            RefreshArg::False => Refresh::False,
            RefreshArg::True => Refresh::True,
            RefreshArg::WaitFor => Refresh::WaitFor,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Asc => SortOrder::Asc,
            SortArg::Desc => SortOrder::Desc,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(cli.config.as_deref(), ENV_PREFIX)
        .context("failed to load configuration")?;
    init_tracing(&config, cli.json_logs);

    tracing::info!("Starting taskhub-search v{}", env!("CARGO_PKG_VERSION"));
    let orchestrator = SearchOrchestrator::from_config(&config)
        .await
        .context("failed to connect to the search engine")?;

    match cli.command {
        Commands::Health { index } => {
            let status = orchestrator.health(index.as_deref()).await?;
            print_json(&json!({
                "index": index,
                "status": status,
                "breaker": orchestrator.breaker_stats(),
            }))?;
        }

        Commands::CreateIndex { name, file, alias } => {
            let mut index_config = match file {
                Some(path) => {
                    let mut definition: IndexConfig = serde_json::from_value(read_json(&path)?)
                        .with_context(|| format!("invalid index definition in {}", path.display()))?;
                    definition.name = name;
                    definition
                }
                None => IndexConfig::standard(name),
            };
            index_config.aliases.extend(alias);

            let outcome = orchestrator.create_index(&index_config).await?;
            print_json(&outcome)?;
        }

        Commands::DeleteIndex { name } => {
            let outcome = orchestrator.delete_index(&name).await?;
            print_json(&outcome)?;
        }

        Commands::Reindex { source, alias } => {
            let report = orchestrator.reindex(&source, &alias).await?;
            print_json(&report)?;
        }

        Commands::Settings { name, set } => {
            let settings = parse_pairs(&set)?;
            if settings.is_empty() {
                bail!("pass at least one --set key=value");
            }
            let update = orchestrator.update_index_settings(&name, &settings).await?;
            print_json(&update)?;
        }

        Commands::Bulk {
            index,
            file,
            batch_size,
            refresh,
        } => {
            let documents = read_documents(&file)?;
            let options = BulkOptions::default()
                .with_batch_size(batch_size)
                .with_refresh(refresh.into());
            let result = orchestrator.bulk_index(&index, documents, options).await?;
            print_json(&result)?;
            if !result.success {
                std::process::exit(2);
            }
        }

        Commands::Search {
            index,
            query,
            filters,
            page,
            limit,
            sort_by,
            sort_order,
            timeout,
            analyzer,
        } => {
            let mut search = SearchQuery::new(query).with_page(page, limit);
            for (field, value) in parse_pairs(&filters)? {
                search = search.with_filter(field, value);
            }
            if let Some(field) = sort_by {
                search = search.with_sort(field, sort_order.into());
            }
            if let Some(timeout) = timeout {
                search = search.with_timeout(timeout);
            }
            if let Some(analyzer) = analyzer {
                search = search.with_analyzer(analyzer);
            }

            let response = orchestrator.search(&search, &index).await;
            print_json(&response)?;
            if !response.success {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &Config, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("taskhub_search={}", config.observability.log_level).into()
    });

    if json_logs || config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// A JSON array of documents, or one document per line
fn read_documents(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON array", path.display()));
    }

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{} is not valid JSON", path.display(), n + 1))
        })
        .collect()
}

fn parse_pairs(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut map = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("expected key=value, got '{}'", pair);
        };
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.trim().to_string(), value);
    }
    Ok(map)
}
