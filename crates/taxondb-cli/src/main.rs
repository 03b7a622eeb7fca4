mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use taxondb_core::config::DatabaseConfig;
use taxondb_core::ingest::Ingestor;
use taxondb_core::storage::s3_object_store;
use taxondb_core::{
    Config, Levels, RemoteDatabase, SqliteStore, TaxId, TaxonTable, TaxonomyFinder,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use output::{Format, TableChoice};

#[derive(Parser)]
#[command(name = "taxondb")]
#[command(about = "Lineage queries and batch classification over the NCBI taxonomy", long_about = None)]
struct Cli {
    /// SQLite database (overrides the configured path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Work on a database kept in S3 under this key
    #[arg(long, global = true)]
    s3_key: Option<String>,

    /// Bucket for --s3-key (defaults to AWS_STORAGE_BUCKET_NAME)
    #[arg(long, global = true)]
    s3_bucket: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a taxdump archive and load it into the database
    Ingest {
        /// Archive URL or local path (defaults to the configured archive)
        #[arg(long)]
        source: Option<String>,

        /// Download retries after the first failure
        #[arg(long)]
        retries: Option<u32>,
    },
    /// Show the ancestors of a taxonomy id at the requested levels
    Ancestors {
        id: TaxId,

        /// Comma separated levels, general to specific
        #[arg(long)]
        levels: Option<Levels>,

        /// Walk the database directly instead of building an index
        #[arg(long)]
        direct: bool,

        #[arg(long, value_enum, default_value = "tsv")]
        format: Format,
    },
    /// List every taxonomy id below a node
    Descendants { id: TaxId },
    /// Classify a batch of taxonomy ids
    Classify {
        ids: Vec<TaxId>,

        /// File with one taxonomy id per line
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        levels: Option<Levels>,

        /// Keep a row for ids missing from the database
        #[arg(long)]
        match_input: bool,

        /// Resolve ids on all cores
        #[arg(long)]
        parallel: bool,

        #[arg(long, value_enum, default_value = "tsv")]
        format: Format,

        #[arg(long, value_enum, default_value = "both")]
        table: TableChoice,
    },
    /// Show id and name of a node's ancestor at every level
    Clade {
        id: TaxId,

        #[arg(long)]
        levels: Option<Levels>,

        #[arg(long, value_enum, default_value = "tsv")]
        format: Format,
    },
    /// Print a sequence header for a taxonomy id
    Header {
        id: TaxId,

        #[arg(long, default_value = "")]
        accession: String,

        #[arg(long)]
        levels: Option<Levels>,
    },
    /// Replace a table with a copy from another database
    CopyTable {
        /// Database to copy from
        #[arg(long)]
        from: PathBuf,

        /// nodes or names
        #[arg(long)]
        table: TaxonTable,
    },
    /// Print the default configuration
    Config,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .wrap_err_with(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().wrap_err("Failed to load configuration")?,
    };
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    if let Some(key) = &cli.s3_key {
        config.database.s3_key = Some(key.clone());
    }
    if let Some(bucket) = &cli.s3_bucket {
        config.database.s3_bucket = Some(bucket.clone());
    }
    Ok(config)
}

/// The configured database, either a local file or a synced S3 copy.
enum Database {
    Local(SqliteStore),
    Remote(RemoteDatabase),
}

impl Database {
    /// Opens the configured database. `create` allows starting a new one.
    async fn open(config: &DatabaseConfig, create: bool) -> Result<Self> {
        match config.s3_key.as_deref().filter(|_| config.is_remote()) {
            Some(key) => {
                let objects = s3_object_store(config.s3_bucket.as_deref())?;
                let remote = RemoteDatabase::open(objects, key, create)
                    .await
                    .wrap_err_with(|| format!("Failed to pull {} from S3", key))?;
                info!("Working on S3 object {} via {}", key, remote.local_path().display());
                Ok(Database::Remote(remote))
            }
            None => {
                let path = &config.path;
                if !create && !path.exists() {
                    bail!(
                        "Database {} does not exist. Run 'taxondb ingest' first.",
                        path.display()
                    );
                }
                let store = SqliteStore::open(path)
                    .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
                Ok(Database::Local(store))
            }
        }
    }

    fn store(&self) -> &SqliteStore {
        match self {
            Database::Local(store) => store,
            Database::Remote(remote) => remote.store(),
        }
    }

    fn describe(&self, config: &DatabaseConfig) -> String {
        match self {
            Database::Local(_) => config.path.display().to_string(),
            Database::Remote(remote) => format!("s3:{}", remote.key()),
        }
    }

    /// Closes the database, uploading a changed remote copy.
    async fn close(self) -> Result<()> {
        match self {
            Database::Local(store) => store.close()?,
            Database::Remote(remote) => {
                let key = remote.key().to_string();
                if remote.close().await? {
                    info!("Pushed updated database to {}", key);
                }
            }
        }
        Ok(())
    }
}

fn read_ids(ids: Vec<TaxId>, input: Option<&Path>) -> Result<Vec<TaxId>> {
    let mut all = ids;
    if let Some(path) = input {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        for (line_no, token) in text
            .lines()
            .enumerate()
            .flat_map(|(n, line)| line.split_whitespace().map(move |t| (n + 1, t)))
        {
            let id = token
                .parse()
                .map_err(|_| eyre!("{}:{}: invalid taxonomy id {:?}", path.display(), line_no, token))?;
            all.push(id);
        }
    }
    Ok(all)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let db_config = config.database.clone();

    match cli.command {
        Commands::Ingest { source, retries } => {
            let mut ingest = config.ingest.clone();
            if let Some(source) = source {
                ingest.archive_url = source;
            }
            if let Some(retries) = retries {
                ingest.fetch_retries = retries;
            }

            let database = Database::open(&db_config, true).await?;
            let ingestor = Ingestor::new(ingest)?;
            info!("Ingesting {} into {}", ingestor.source(), database.describe(&db_config));

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message(format!("Ingesting {}", ingestor.source()));

            let result = ingestor.run(database.store()).await;
            spinner.finish_and_clear();
            let stats = result?;

            println!(
                "Loaded {} nodes and {} names into {}",
                stats.nodes,
                stats.names,
                database.describe(&db_config)
            );
            println!("  Source: {}", stats.source);
            println!("  SHA-256: {}", stats.sha256);
            database.close().await?;
        }
        Commands::Ancestors {
            id,
            levels,
            direct,
            format,
        } => {
            let levels = levels.unwrap_or_else(|| config.query.levels.clone());
            let database = Database::open(&db_config, false).await?;
            let finder = TaxonomyFinder::new(database.store(), config.query);
            let lineage = if direct {
                finder.find_ancestors_direct(id, Some(&levels))?
            } else {
                finder.find_ancestors(id, Some(&levels))?
            };
            match lineage {
                Some(lineage) => output::print_lineage(&lineage, &levels, format)?,
                None => bail!("Taxonomy id {} not found", id),
            }
            drop(finder);
            database.close().await?;
        }
        Commands::Descendants { id } => {
            let database = Database::open(&db_config, false).await?;
            let finder = TaxonomyFinder::new(database.store(), config.query);
            let mut descendants: Vec<TaxId> = finder.find_descendants(id)?.into_iter().collect();
            descendants.sort_unstable();
            for d in descendants {
                println!("{}", d);
            }
            drop(finder);
            database.close().await?;
        }
        Commands::Classify {
            ids,
            input,
            levels,
            match_input,
            parallel,
            format,
            table,
        } => {
            let ids = read_ids(ids, input.as_deref())?;
            if ids.is_empty() {
                bail!("No taxonomy ids given");
            }
            let mut query = config.query;
            query.parallel |= parallel;

            let database = Database::open(&db_config, false).await?;
            let finder = TaxonomyFinder::new(database.store(), query);
            let result = finder.classify(&ids, levels.as_ref(), match_input)?;
            output::print_classification(&result, format, table)?;
            drop(finder);
            database.close().await?;
        }
        Commands::Clade { id, levels, format } => {
            let levels = levels.unwrap_or_else(|| config.query.levels.clone());
            let database = Database::open(&db_config, false).await?;
            let finder = TaxonomyFinder::new(database.store(), config.query);
            let clades = finder.clade_info(id, &levels)?;
            output::print_clade_info(&clades, format)?;
            drop(finder);
            database.close().await?;
        }
        Commands::Header {
            id,
            accession,
            levels,
        } => {
            let levels = levels.unwrap_or_else(|| config.query.levels.clone());
            let database = Database::open(&db_config, false).await?;
            let finder = TaxonomyFinder::new(database.store(), config.query);
            println!("{}", finder.sequence_header(id, &accession, &levels)?);
            drop(finder);
            database.close().await?;
        }
        Commands::CopyTable { from, table } => {
            if !from.exists() {
                bail!("Source database {} does not exist", from.display());
            }
            let source = SqliteStore::open(&from)
                .wrap_err_with(|| format!("Failed to open {}", from.display()))?;
            // A remote target keeps its other tables, so it is pulled first.
            let target = Database::open(&db_config, !db_config.is_remote()).await?;
            info!("Copying {} from {}", table, from.display());
            let copied = target.store().copy_table_from(&source, table)?;
            println!(
                "Copied {} rows of {} from {} into {}",
                copied,
                table,
                from.display(),
                target.describe(&db_config)
            );
            source.close()?;
            target.close().await?;
        }
        Commands::Config => print!("{}", Config::default_config_string()),
    }

    Ok(())
}
