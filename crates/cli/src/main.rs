use clap::{ArgGroup, Args, Parser, Subcommand};
use lib::render::{self, OutputFormat};
use lib::{Query, QueryMode, ToolScout};

#[derive(Parser)]
#[command(name = "toolscout")]
#[command(about = "Find the right command-line tool or MCP capability for an error or task", long_about = None)]
struct Cli {
    /// Config file path (default: TOOLSCOUT_CONFIG_PATH or ~/.toolscout/config.json)
    #[arg(long, short, value_name = "PATH", global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init,

    /// Recommend tools for an error message, a task, a category, a name, or free text.
    Discover(DiscoverArgs),

    /// List known tools, optionally in one category.
    List {
        /// Category (development, data-processing, network, system, archive, container, cloud, documentation, remote, other)
        #[arg(long)]
        category: Option<String>,

        /// Only tools that are installed / reachable.
        #[arg(long)]
        available: bool,

        #[arg(long, short, default_value = "text")]
        format: OutputFormat,
    },

    /// Detail for one tool (re-probes local binaries). Remote capabilities may be given as server/name.
    Describe {
        name: String,

        #[arg(long, short, default_value = "text")]
        format: OutputFormat,
    },

    /// List configured MCP servers and their status.
    Servers {
        #[arg(long, short, default_value = "text")]
        format: OutputFormat,
    },

    /// Rebuild the registry cache now.
    Refresh,

    /// Session-start hook: print a short inventory summary without blocking on discovery, then finish the rebuild.
    Hook {
        #[arg(long, short, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("mode").args(["error", "task", "category", "name", "text"])))]
struct DiscoverArgs {
    /// Error message to match against known error patterns.
    #[arg(long, value_name = "MESSAGE")]
    error: Option<String>,

    /// Task description to match against known task patterns.
    #[arg(long, value_name = "DESCRIPTION")]
    task: Option<String>,

    /// Exact category.
    #[arg(long)]
    category: Option<String>,

    /// Exact tool name.
    #[arg(long)]
    name: Option<String>,

    /// Free text matched against names, descriptions and categories. Empty matches everything.
    text: Option<String>,

    /// Only tools that are installed / reachable.
    #[arg(long)]
    available: bool,

    /// Maximum number of results.
    #[arg(long, short)]
    limit: Option<usize>,

    #[arg(long, short, default_value = "text")]
    format: OutputFormat,
}

impl DiscoverArgs {
    fn query(&self) -> Query {
        let pick = [
            (QueryMode::Error, &self.error),
            (QueryMode::Task, &self.task),
            (QueryMode::Category, &self.category),
            (QueryMode::Name, &self.name),
        ];
        for (mode, value) in pick {
            if let Some(v) = value {
                return Query::new(mode, v.clone());
            }
        }
        Query::text(self.text.clone().unwrap_or_default())
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("toolscout {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init) => run_init(config),
        Some(Commands::Discover(args)) => run_discover(config, args).await,
        Some(Commands::List {
            category,
            available,
            format,
        }) => run_list(config, category, available, format).await,
        Some(Commands::Describe { name, format }) => run_describe(config, name, format).await,
        Some(Commands::Servers { format }) => run_servers(config, format).await,
        Some(Commands::Refresh) => run_refresh(config).await,
        Some(Commands::Hook { format }) => run_hook(config, format).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn scout(config_path: Option<std::path::PathBuf>) -> anyhow::Result<ToolScout> {
    let (config, path) = lib::config::load_config(config_path)?;
    Ok(ToolScout::from_config(&config, &path))
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_discover(
    config_path: Option<std::path::PathBuf>,
    args: DiscoverArgs,
) -> anyhow::Result<()> {
    let scout = scout(config_path)?;
    let filter = lib::query::Filter {
        available_only: args.available,
        limit: args.limit,
    };
    let found = scout.discover_filtered(&args.query(), filter).await?;
    println!("{}", render::entries(&found, args.format));
    Ok(())
}

async fn run_list(
    config_path: Option<std::path::PathBuf>,
    category: Option<String>,
    available: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let category = match category {
        Some(c) => Some(
            lib::catalog::Category::parse(&c)
                .ok_or_else(|| anyhow::anyhow!("unknown category: {}", c))?,
        ),
        None => None,
    };
    let scout = scout(config_path)?;
    let filter = lib::query::Filter {
        available_only: available,
        limit: None,
    };
    let entries = scout.list(category, filter).await?;
    println!("{}", render::entries(&entries, format));
    Ok(())
}

async fn run_describe(
    config_path: Option<std::path::PathBuf>,
    name: String,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let scout = scout(config_path)?;
    match scout.describe(&name).await? {
        Some(detail) => println!("{}", render::detail(&detail, format)),
        None if format == OutputFormat::Json => println!("null"),
        None => println!("not found: {}", name),
    }
    Ok(())
}

async fn run_servers(
    config_path: Option<std::path::PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let scout = scout(config_path)?;
    let servers = scout.servers().await?;
    println!("{}", render::servers(&servers, format));
    Ok(())
}

async fn run_refresh(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let scout = scout(config_path)?;
    let reg = scout.refresh().await?;
    println!("{}", render::summary(&reg));
    println!("cache: {}", scout.cache_path().display());
    Ok(())
}

async fn run_hook(
    config_path: Option<std::path::PathBuf>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let scout = scout(config_path)?;
    let ensured = scout.ensure_registry_background().await;
    let answered = match ensured.registry {
        Ok(reg) => {
            println!("{}", render::hook(&reg, format));
            true
        }
        Err(e) if ensured.pending.is_some() => {
            log::info!("{}", e);
            false
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(pending) = ensured.pending {
        match pending.wait().await {
            Ok(done) => {
                log::info!("registry refreshed: {} entries", done.entries.len());
                if !answered {
                    println!("{}", render::hook(&done, format));
                }
            }
            Err(e) if answered => log::warn!("background refresh failed: {}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
