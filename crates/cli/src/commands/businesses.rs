use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand};
use explorium_client::types::DEFAULT_BUSINESS_TYPE;
use explorium_client::{parse_types, BusinessFilters, BUSINESS_TYPES};
use explorium_engine::EntityKind;
use serde_json::Value;

use super::events::{self, EventCommands};
use super::flows::{self, emit_call, EnrichOptions, IdSource, MatchOptions, Paging};
use crate::app::App;
use crate::output::envelope;
use crate::util::split_list;
use crate::{CliError, GlobalArgs};

#[derive(Subcommand, Debug)]
pub enum BusinessCommands {
    /// Match companies to business IDs, from flags or a file
    Match(MatchArgs),

    /// Search companies by firmographic filters
    Search(SearchArgs),

    /// Enrich one company, by ID or by matching it first
    Enrich(EnrichArgs),

    /// Enrich many companies by business ID, in chunks
    BulkEnrich(BulkEnrichArgs),

    /// Match every row of a file, enrich the matches, keep the input columns
    EnrichFile(EnrichFileArgs),

    /// Check a company's website for keywords
    EnrichKeywords(KeywordArgs),

    /// Find companies similar to one business
    Lookalike(IdArgs),

    /// Suggest company names for a partial query
    Autocomplete(QueryArgs),

    /// Business events and event subscriptions
    #[command(subcommand)]
    Events(EventCommands),
}

/// Fields identifying one company.
#[derive(Args, Debug, Default)]
pub struct CompanyFields {
    /// Company name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Company website or domain
    #[arg(long, short = 'd')]
    pub domain: Option<String>,

    /// Company LinkedIn URL
    #[arg(long, short = 'l')]
    pub linkedin: Option<String>,
}

impl CompanyFields {
    fn row(&self) -> Option<explorium_engine::RawRow> {
        flows::flag_row(&[
            ("name", &self.name),
            ("domain", &self.domain),
            ("linkedin_url", &self.linkedin),
        ])
    }
}

#[derive(Args, Debug)]
pub struct MatchArgs {
    #[command(flatten)]
    pub fields: CompanyFields,

    /// CSV or JSON rows to match ("-" for stdin)
    #[arg(long, short = 'f', conflicts_with_all = ["name", "domain", "linkedin"])]
    pub file: Option<PathBuf>,

    /// Lowest confidence accepted as a match (0-1) [default: from config]
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Print a matched/unmatched summary on stderr
    #[arg(long)]
    pub summary: bool,

    /// Print only the matched IDs, one per line
    #[arg(long)]
    pub ids_only: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Country codes, comma-separated (e.g. us,ca)
    #[arg(long)]
    pub country: Option<String>,

    /// Company size ranges, comma-separated (e.g. 51-200,201-500)
    #[arg(long)]
    pub size: Option<String>,

    /// Revenue ranges, comma-separated (e.g. 10M-25M)
    #[arg(long)]
    pub revenue: Option<String>,

    /// LinkedIn industry categories, comma-separated
    #[arg(long)]
    pub industry: Option<String>,

    /// Technologies in the stack, comma-separated
    #[arg(long)]
    pub tech: Option<String>,

    /// Business events, comma-separated (e.g. new_funding_round)
    #[arg(long)]
    pub events: Option<String>,

    /// Only events within this many days
    #[arg(long, default_value_t = explorium_client::businesses::DEFAULT_EVENTS_DAYS)]
    pub events_days: u32,

    /// Page to fetch
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Records per page [default: from config]
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Collect this many records across pages
    #[arg(long, conflicts_with = "page")]
    pub total: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// Business ID (skips matching)
    #[arg(long, short = 'i')]
    pub id: Option<String>,

    #[command(flatten)]
    pub fields: CompanyFields,

    /// Enrichment types, comma-separated, or "all"
    #[arg(long, short = 't', default_value = DEFAULT_BUSINESS_TYPE)]
    pub types: String,

    /// Lowest confidence accepted as a match (0-1) [default: from config]
    #[arg(long)]
    pub min_confidence: Option<f64>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["ids", "file", "match_file"])))]
pub struct BulkEnrichArgs {
    /// Business IDs, comma-separated
    #[arg(long)]
    pub ids: Option<String>,

    /// File with a business_id column; other columns are kept
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// File of companies to match first
    #[arg(long)]
    pub match_file: Option<PathBuf>,

    /// Enrichment types, comma-separated, or "all"
    #[arg(long, short = 't', default_value = DEFAULT_BUSINESS_TYPE)]
    pub types: String,

    /// Lowest confidence accepted as a match (0-1) [default: from config]
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Print a matched/unmatched summary on stderr
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct EnrichFileArgs {
    /// CSV or JSON rows to match and enrich ("-" for stdin)
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Enrichment types, comma-separated, or "all"
    #[arg(long, short = 't', default_value = DEFAULT_BUSINESS_TYPE)]
    pub types: String,

    /// Lowest confidence accepted as a match (0-1) [default: from config]
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Print a matched/unmatched summary on stderr
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Business ID
    #[arg(long, short = 'i')]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct KeywordArgs {
    /// Business ID
    #[arg(long, short = 'i')]
    pub id: String,

    /// Keywords to look for, comma-separated
    #[arg(long, short = 'k')]
    pub keywords: String,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Partial company name
    #[arg(long, short = 'q')]
    pub query: String,
}

pub fn run(cmd: BusinessCommands, global: &GlobalArgs) -> Result<(), CliError> {
    let app = App::load(global)?;
    let api = app.entity(EntityKind::Business)?;

    match cmd {
        BusinessCommands::Match(args) => {
            let rows = match (&args.file, args.fields.row()) {
                (Some(path), _) => flows::read_input(path)?,
                (None, Some(row)) => {
                    flows::flag_descriptor(&api, &row)?;
                    vec![row]
                }
                (None, None) => {
                    return Err(CliError::args("pass --name, --domain, --linkedin or --file"));
                }
            };
            let opts = MatchOptions {
                threshold: app.threshold(args.min_confidence),
                summary: args.summary,
                ids_only: args.ids_only,
            };
            flows::run_match(&app, &api, &rows, opts)
        }

        BusinessCommands::Search(args) => {
            let filters = BusinessFilters {
                country: list(&args.country),
                size: list(&args.size),
                revenue: list(&args.revenue),
                industry: list(&args.industry),
                tech: list(&args.tech),
                events: list(&args.events),
                events_days: args.events_days,
            };
            let paging = Paging { page: args.page, page_size: args.page_size, total: args.total };
            let collected = flows::search(&app, &api, &filters.to_json(), &paging)?;
            let meta = collected.meta();
            app.emit(&envelope(Value::Array(collected.records), &[("_search_meta", meta)]))
        }

        BusinessCommands::Enrich(args) => {
            let types = parse_types(BUSINESS_TYPES, &args.types, DEFAULT_BUSINESS_TYPE)?;
            let threshold = app.threshold(args.min_confidence);
            flows::run_enrich_one(&app, &api, args.id, args.fields.row(), &types, threshold)
        }

        BusinessCommands::BulkEnrich(args) => {
            let types = parse_types(BUSINESS_TYPES, &args.types, DEFAULT_BUSINESS_TYPE)?;
            let source = match (&args.ids, &args.file, &args.match_file) {
                (Some(ids), _, _) => IdSource::List(split_list(ids)),
                (_, Some(path), _) => IdSource::File(path),
                (_, _, Some(path)) => IdSource::MatchFile(path),
                _ => return Err(CliError::args("pass --ids, --file or --match-file")),
            };
            let opts = EnrichOptions {
                types: &types,
                threshold: app.threshold(args.min_confidence),
                summary: args.summary,
            };
            flows::run_bulk_enrich(&app, &api, source, opts)
        }

        BusinessCommands::EnrichFile(args) => {
            let types = parse_types(BUSINESS_TYPES, &args.types, DEFAULT_BUSINESS_TYPE)?;
            let opts = EnrichOptions {
                types: &types,
                threshold: app.threshold(args.min_confidence),
                summary: args.summary,
            };
            flows::run_enrich_file(&app, &api, &args.file, opts)
        }

        BusinessCommands::EnrichKeywords(args) => {
            let keywords = split_list(&args.keywords);
            if keywords.is_empty() {
                return Err(CliError::args("--keywords is empty"));
            }
            let id = args.id.trim();
            emit_call(&app, "website keywords", |_| api.website_keywords(id, &keywords))
        }

        BusinessCommands::Lookalike(args) => {
            let id = args.id.trim();
            emit_call(&app, "lookalike", |_| api.lookalike(id))
        }

        BusinessCommands::Autocomplete(args) => emit_call(&app, "autocomplete", |_| {
            api.autocomplete(&args.query, "company_name")
        }),

        BusinessCommands::Events(cmd) => events::run(cmd, &app, &api),
    }
}

fn list(value: &Option<String>) -> Vec<String> {
    value.as_deref().map(split_list).unwrap_or_default()
}
