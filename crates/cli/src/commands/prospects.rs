use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};
use explorium_client::types::DEFAULT_PROSPECT_TYPE;
use explorium_client::{parse_types, EntityApi, MonthRange, ProspectFilters, PROSPECT_TYPES};
use explorium_engine::fanout::fan_out;
use explorium_engine::rows::extract_ids;
use explorium_engine::{resolver, EntityKind, MatchDescriptor, PageRequest, RawRow};
use serde_json::Value;
use tracing::{info, warn};

use super::events::{self, EventCommands};
use super::flows::{self, emit_call, EnrichOptions, IdSource, MatchOptions, Paging};
use crate::app::App;
use crate::output::{envelope, search_summary};
use crate::util::split_list;
use crate::{CliError, GlobalArgs};

#[derive(Subcommand, Debug)]
pub enum ProspectCommands {
    /// Match people to prospect IDs, from flags or a file
    Match(MatchArgs),

    /// Search people at given companies, with role filters
    Search(SearchArgs),

    /// Enrich one person, by ID or by matching them first
    Enrich(EnrichArgs),

    /// Enrich many people by prospect ID, in chunks
    BulkEnrich(BulkEnrichArgs),

    /// Match every row of a file, enrich the matches, keep the input columns
    EnrichFile(EnrichFileArgs),

    /// Suggest names, job titles or departments for a partial query
    Autocomplete(AutocompleteArgs),

    /// Prospect counts at given companies, optionally grouped
    Statistics(StatisticsArgs),

    /// Prospect events and event subscriptions
    #[command(subcommand)]
    Events(EventCommands),
}

/// Fields identifying one person.
#[derive(Args, Debug)]
pub struct PersonFields {
    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,

    /// Email address
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// LinkedIn profile URL
    #[arg(long, short = 'l')]
    pub linkedin: Option<String>,

    /// Current employer
    #[arg(long)]
    pub company_name: Option<String>,
}

impl PersonFields {
    fn row(&self) -> Option<RawRow> {
        flows::flag_row(&[
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("linkedin", &self.linkedin),
            ("company_name", &self.company_name),
        ])
    }
}

#[derive(Args, Debug)]
pub struct MatchArgs {
    #[command(flatten)]
    pub fields: PersonFields,

    /// CSV or JSON rows to match ("-" for stdin)
    #[arg(
        long,
        short = 'f',
        conflicts_with_all = ["first_name", "last_name", "email", "linkedin", "company_name"]
    )]
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
#[command(group(ArgGroup::new("companies").args(["business_id", "business_file", "company_name"])))]
pub struct SearchArgs {
    /// Business IDs, comma-separated
    #[arg(long)]
    pub business_id: Option<String>,

    /// File with a business_id column
    #[arg(long)]
    pub business_file: Option<PathBuf>,

    /// Company names, comma-separated; matched to business IDs first
    #[arg(long)]
    pub company_name: Option<String>,

    /// Job levels, comma-separated (e.g. cxo,vp,director)
    #[arg(long)]
    pub job_level: Option<String>,

    /// Departments, comma-separated (e.g. engineering,sales)
    #[arg(long)]
    pub department: Option<String>,

    /// Job title phrase; related titles are included
    #[arg(long)]
    pub job_title: Option<String>,

    /// Country codes, comma-separated
    #[arg(long)]
    pub country: Option<String>,

    /// Only people with an email address
    #[arg(long)]
    pub has_email: bool,

    /// Only people with a phone number
    #[arg(long)]
    pub has_phone: bool,

    /// Minimum total experience, in months
    #[arg(long)]
    pub experience_min: Option<u32>,

    /// Maximum total experience, in months
    #[arg(long)]
    pub experience_max: Option<u32>,

    /// Minimum months in the current role
    #[arg(long)]
    pub role_tenure_min: Option<u32>,

    /// Maximum months in the current role
    #[arg(long)]
    pub role_tenure_max: Option<u32>,

    /// Search each company separately and keep up to N people per company
    #[arg(long, conflicts_with_all = ["page", "total"])]
    pub max_per_company: Option<usize>,

    /// Lowest confidence for --company-name matches (0-1) [default: from config]
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Page to fetch
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Records per page [default: from config]
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Collect this many records across pages
    #[arg(long, conflicts_with = "page")]
    pub total: Option<usize>,

    /// Print country, job level and contact breakdowns on stderr
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// Prospect ID (skips matching)
    #[arg(long, short = 'i')]
    pub id: Option<String>,

    #[command(flatten)]
    pub fields: PersonFields,

    /// Enrichment types: contacts, profile, social, or "all"
    #[arg(long, short = 't', default_value = DEFAULT_PROSPECT_TYPE)]
    pub types: String,

    /// Lowest confidence accepted as a match (0-1) [default: from config]
    #[arg(long)]
    pub min_confidence: Option<f64>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["ids", "file", "match_file"])))]
pub struct BulkEnrichArgs {
    /// Prospect IDs, comma-separated
    #[arg(long)]
    pub ids: Option<String>,

    /// File with a prospect_id column; other columns are kept
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// File of people to match first
    #[arg(long)]
    pub match_file: Option<PathBuf>,

    /// Enrichment types: contacts, profile, social, or "all"
    #[arg(long, short = 't', default_value = DEFAULT_PROSPECT_TYPE)]
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

    /// Enrichment types: contacts, profile, social, or "all"
    #[arg(long, short = 't', default_value = DEFAULT_PROSPECT_TYPE)]
    pub types: String,

    /// Lowest confidence accepted as a match (0-1) [default: from config]
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Print a matched/unmatched summary on stderr
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompleteField {
    Name,
    JobTitle,
    Department,
}

impl CompleteField {
    fn api_name(self) -> &'static str {
        match self {
            CompleteField::Name => "prospect_name",
            CompleteField::JobTitle => "job_title",
            CompleteField::Department => "job_department",
        }
    }
}

#[derive(Args, Debug)]
pub struct AutocompleteArgs {
    /// Partial text to complete
    #[arg(long, short = 'q')]
    pub query: String,

    /// What to complete
    #[arg(long, value_enum, default_value_t = CompleteField::Name)]
    pub field: CompleteField,
}

#[derive(Args, Debug)]
pub struct StatisticsArgs {
    /// Business IDs, comma-separated
    #[arg(long, short = 'b')]
    pub business_id: String,

    /// Fields to group counts by, comma-separated
    #[arg(long)]
    pub group_by: Option<String>,
}

pub fn run(cmd: ProspectCommands, global: &GlobalArgs) -> Result<(), CliError> {
    let app = App::load(global)?;
    let api = app.entity(EntityKind::Prospect)?;

    match cmd {
        ProspectCommands::Match(args) => {
            let rows = match (&args.file, args.fields.row()) {
                (Some(path), _) => flows::read_input(path)?,
                (None, Some(row)) => {
                    flows::flag_descriptor(&api, &row)?;
                    vec![row]
                }
                (None, None) => {
                    return Err(CliError::args(
                        "pass --email, --linkedin, --first-name/--last-name with --company-name, or --file",
                    ));
                }
            };
            let opts = MatchOptions {
                threshold: app.threshold(args.min_confidence),
                summary: args.summary,
                ids_only: args.ids_only,
            };
            flows::run_match(&app, &api, &rows, opts)
        }

        ProspectCommands::Search(args) => search(&app, &api, args),

        ProspectCommands::Enrich(args) => {
            let types = parse_types(PROSPECT_TYPES, &args.types, DEFAULT_PROSPECT_TYPE)?;
            let threshold = app.threshold(args.min_confidence);
            flows::run_enrich_one(&app, &api, args.id, args.fields.row(), &types, threshold)
        }

        ProspectCommands::BulkEnrich(args) => {
            let types = parse_types(PROSPECT_TYPES, &args.types, DEFAULT_PROSPECT_TYPE)?;
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

        ProspectCommands::EnrichFile(args) => {
            let types = parse_types(PROSPECT_TYPES, &args.types, DEFAULT_PROSPECT_TYPE)?;
            let opts = EnrichOptions {
                types: &types,
                threshold: app.threshold(args.min_confidence),
                summary: args.summary,
            };
            flows::run_enrich_file(&app, &api, &args.file, opts)
        }

        ProspectCommands::Autocomplete(args) => emit_call(&app, "autocomplete", |_| {
            api.autocomplete(&args.query, args.field.api_name())
        }),

        ProspectCommands::Statistics(args) => {
            let business_ids = split_list(&args.business_id);
            if business_ids.is_empty() {
                return Err(CliError::args("--business-id is empty"));
            }
            let group_by = list(&args.group_by);
            emit_call(&app, "statistics", |_| api.prospect_statistics(&business_ids, &group_by))
        }

        ProspectCommands::Events(cmd) => events::run(cmd, &app, &api),
    }
}

// ── Search ──────────────────────────────────────────────────────────

fn search(app: &App, api: &EntityApi, args: SearchArgs) -> Result<(), CliError> {
    let business_ids = business_ids(app, &args)?;

    let filters = ProspectFilters {
        business_ids: business_ids.clone(),
        job_level: list(&args.job_level),
        department: list(&args.department),
        job_title: args.job_title.clone().filter(|t| !t.trim().is_empty()),
        country: list(&args.country),
        has_email: args.has_email,
        has_phone: args.has_phone,
        experience: MonthRange { min: args.experience_min, max: args.experience_max },
        role_tenure: MonthRange { min: args.role_tenure_min, max: args.role_tenure_max },
    };

    let (records, meta) = match args.max_per_company {
        Some(0) => return Err(CliError::args("--max-per-company must be at least 1")),
        Some(per_company) => {
            if business_ids.is_empty() {
                return Err(CliError::args(
                    "--max-per-company needs --business-id, --business-file or --company-name",
                ));
            }
            let page_size = app.page_size(args.page_size)?;
            let report = fan_out(
                &business_ids,
                EntityKind::Prospect.id_field(),
                PageRequest::until(per_company, page_size),
                |business_id, page, size| {
                    api.search_page(&filters.for_business(business_id), per_company, page, size)
                },
                &app.ctx,
            )?;
            if report.errors() > 0 {
                warn!("{} of {} companies failed", report.errors(), report.per_key.len());
            }
            let meta = report.meta();
            (report.records, meta)
        }
        None => {
            let paging = Paging { page: args.page, page_size: args.page_size, total: args.total };
            let collected = flows::search(app, api, &filters.to_json(), &paging)?;
            let meta = collected.meta();
            (collected.records, meta)
        }
    };

    if args.summary {
        for line in search_summary(&records) {
            eprintln!("{}", line);
        }
    }
    app.emit(&envelope(Value::Array(records), &[("_search_meta", meta)]))
}

/// Business IDs from `--business-id`, `--business-file`, or company names
/// resolved through business matching.
fn business_ids(app: &App, args: &SearchArgs) -> Result<Vec<String>, CliError> {
    if let Some(ids) = &args.business_id {
        return Ok(split_list(ids));
    }

    if let Some(path) = &args.business_file {
        let rows = flows::read_input(path)?;
        let ids = extract_ids(&rows, EntityKind::Business.id_field())?;
        return Ok(ids.requests.into_iter().map(|r| r.id).collect());
    }

    let Some(names) = args.company_name.as_deref().map(split_list) else {
        return Ok(Vec::new());
    };
    if names.is_empty() {
        return Err(CliError::args("--company-name is empty"));
    }

    let businesses = app.entity(EntityKind::Business)?;
    let descriptors: Vec<MatchDescriptor> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut d = MatchDescriptor::new(EntityKind::Business, i);
            d.name = Some(name.clone());
            d
        })
        .collect();
    let threshold = app.threshold(args.min_confidence);
    let outcomes = resolver::resolve(&businesses, &descriptors, threshold, &app.ctx)?;

    let mut ids = Vec::new();
    for (name, outcome) in names.iter().zip(outcomes) {
        match outcome.resolved_id() {
            Some(id) => {
                info!("'{}' -> {}", name, id);
                ids.push(id.to_string());
            }
            None => warn!("No business match for '{}'", name),
        }
    }
    if ids.is_empty() {
        return Err(CliError::new(
            crate::exit_codes::EXIT_NO_MATCH,
            "none of the company names matched a business",
        ));
    }
    Ok(ids)
}

fn list(value: &Option<String>) -> Vec<String> {
    value.as_deref().map(split_list).unwrap_or_default()
}
