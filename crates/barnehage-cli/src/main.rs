mod display;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use barnehage_core::{
    AgeGroup, DateScan, MappingError, PageParser, ParseOutcome, ParserOptions, RegistryStore,
    apply_bootstrap, run_reconciliation,
};
use barnehage_store::{DuckStore, ListingFilter, Near};
use barnehage_sync::bootstrap::{DEFAULT_API_URL, DEFAULT_KOMMUNE};
use barnehage_sync::http::DEFAULT_PAGE_URL;
use barnehage_sync::{BootstrapClient, PageClient};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Track free kindergarten spots in Oslo.
#[derive(Debug, Parser)]
#[command(name = "barnehage", version, about)]
struct Cli {
    /// DuckDB registry file. An in-memory registry is used when omitted.
    #[arg(long, env = "BARNEHAGE_DB", global = true, value_name = "path")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Populate the registry from barnehagefakta.no.
    Init {
        #[arg(long, env = "BARNEHAGE_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,
        #[arg(long, env = "BARNEHAGE_KOMMUNE", default_value = DEFAULT_KOMMUNE)]
        kommune: String,
        /// Detail requests in flight at once.
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        /// Pause before each detail request, in milliseconds.
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },
    /// Fetch the availability page and reconcile it into the registry.
    Scrape {
        #[arg(long, env = "BARNEHAGE_PAGE_URL", default_value = DEFAULT_PAGE_URL)]
        url: String,
        /// Read the page from a file instead of fetching it.
        #[arg(long, value_name = "path")]
        from_file: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        retries: u32,
        #[command(flatten)]
        parser: ParserArgs,
        /// Write parsed observations as JSON.
        #[arg(long, value_name = "path")]
        data_out: Option<PathBuf>,
        /// Write parse and mapping errors as JSON.
        #[arg(long, value_name = "path")]
        errors_out: Option<PathBuf>,
    },
    /// Parse a saved page and print observations and errors as JSON.
    Parse {
        file: PathBuf,
        #[command(flatten)]
        parser: ParserArgs,
    },
    /// List kindergartens in the registry.
    List {
        #[arg(long)]
        region: Option<String>,
        /// One of "under 3 years", "over 3 years", "2-6 years", "unknown".
        #[arg(long)]
        age_group: Option<AgeGroup>,
        /// Only kindergartens with an available spot.
        #[arg(long)]
        available: bool,
        /// Circle as `lat,lng,km`.
        #[arg(long, value_name = "lat,lng,km", value_parser = parse_near)]
        near: Option<Near>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show one kindergarten with its spot history.
    Show { orgnr: String },
}

#[derive(Debug, Args)]
struct ParserArgs {
    /// Date assignment for listings with several spot counts: `per-candidate` or `shared`.
    #[arg(long, default_value = "per-candidate", value_parser = parse_date_scan)]
    date_scan: DateScan,
    /// Year for bare month names when a district header carries none.
    #[arg(long)]
    default_year: Option<i32>,
}

impl ParserArgs {
    fn options(&self) -> ParserOptions {
        let mut options = ParserOptions {
            date_scan: self.date_scan,
            ..ParserOptions::default()
        };
        if let Some(year) = self.default_year {
            options.default_year = year;
        }
        options
    }
}

fn parse_date_scan(raw: &str) -> Result<DateScan, String> {
    match raw {
        "per-candidate" => Ok(DateScan::PerCandidate),
        "shared" => Ok(DateScan::Shared),
        other => Err(format!("expected `per-candidate` or `shared`, got {other:?}")),
    }
}

fn parse_near(raw: &str) -> Result<Near, String> {
    let values = raw
        .split(',')
        .map(str::trim)
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| format!("failed to parse circle value: {error}"))?;
    match values[..] {
        [lat, lng, max_km] => Ok(Near { lat, lng, max_km }),
        _ => Err("circle must be three comma-separated numbers: lat,lng,km".to_owned()),
    }
}

/// Diagnostics of one scrape, as printed and written to `--errors-out`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunErrors<'a> {
    parse_errors: &'a [MappingError],
    mapping_errors: &'a [MappingError],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("barnehage v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Init {
            api_url,
            kommune,
            concurrency,
            delay_ms,
        } => {
            let client = BootstrapClient::new(api_url)
                .with_kommune(kommune)
                .with_rate(concurrency, Duration::from_millis(delay_ms));
            let kindergartens = client.bootstrap().await.context("bootstrapping registry")?;
            let total = kindergartens.len();

            let mut store = open_store(cli.db.as_deref())?;
            let created = apply_bootstrap(&mut store, kindergartens)?;
            store.close()?;
            info!(total, created, "registry initialised");
        }

        Command::Scrape {
            url,
            from_file,
            retries,
            parser,
            data_out,
            errors_out,
        } => {
            let html = match from_file {
                Some(path) => read_page(&path)?,
                None => PageClient::new(url)
                    .with_retries(retries, Duration::from_secs(2))
                    .fetch()
                    .await
                    .context("fetching availability page")?,
            };

            let outcome = PageParser::new(parser.options()).parse(&html);
            log_errors("parse", &outcome.errors);
            if let Some(path) = &data_out {
                write_json(path, &outcome.data)?;
            }

            let mut store = open_store(cli.db.as_deref())?;
            if store.count()? == 0 {
                warn!("registry is empty; run `barnehage init` first");
            }
            let report = run_reconciliation(&mut store, &outcome.data, Utc::now())?;
            store.close()?;
            log_errors("mapping", &report.errors);

            let errors = RunErrors {
                parse_errors: &outcome.errors,
                mapping_errors: &report.errors,
            };
            if let Some(path) = &errors_out {
                write_json(path, &errors)?;
            }
            println!("{}", serde_json::to_string_pretty(&errors)?);
            info!(
                observations = outcome.data.len(),
                appended = report.appended(),
                refreshed = report.refreshed(),
                taken = report.taken(),
                "scrape complete"
            );
        }

        Command::Parse { file, parser } => {
            let html = read_page(&file)?;
            let outcome: ParseOutcome = PageParser::new(parser.options()).parse(&html);
            info!(
                observations = outcome.data.len(),
                errors = outcome.errors.len(),
                "parsed page"
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::List {
            region,
            age_group,
            available,
            near,
            limit,
            offset,
            json,
        } => {
            let mut store = open_store(cli.db.as_deref())?;
            let filter = ListingFilter {
                region,
                age_group,
                available_only: available,
                near,
                offset,
                limit,
            };
            let page = filter.apply(store.find_all()?);
            store.close()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                display::print_listing(&page);
            }
        }

        Command::Show { orgnr } => {
            let mut store = open_store(cli.db.as_deref())?;
            let found = store.find_by_id(&orgnr)?;
            store.close()?;
            match found {
                Some(kindergarten) => display::print_card(&kindergarten),
                None => bail!("no kindergarten with orgnr {orgnr}"),
            }
        }
    }

    Ok(())
}

fn open_store(db: Option<&Path>) -> anyhow::Result<DuckStore> {
    let store = match db {
        Some(path) => DuckStore::open_persistent(path)
            .with_context(|| format!("opening registry at {}", path.display()))?,
        None => {
            warn!("no --db given; using an in-memory registry");
            DuckStore::open()?
        }
    };
    Ok(store)
}

fn read_page(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote json");
    Ok(())
}

fn log_errors(stage: &str, errors: &[MappingError]) {
    for error in errors {
        warn!(stage, kind = error.kind(), "{error}");
    }
}
