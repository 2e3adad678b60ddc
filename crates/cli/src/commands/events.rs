//! `events` subcommands, shared by businesses and prospects.

use clap::{Args, Subcommand};
use explorium_client::EntityApi;

use super::flows::emit_call;
use crate::app::App;
use crate::util::split_list;
use crate::CliError;

#[derive(Subcommand, Debug)]
pub enum EventCommands {
    /// List recent events for the given IDs
    List(EventArgs),

    /// Subscribe IDs to event notifications
    Enroll(EnrollArgs),

    /// Show existing event subscriptions
    Enrollments,
}

#[derive(Args, Debug)]
pub struct EventArgs {
    /// IDs, comma-separated
    #[arg(long)]
    pub ids: String,

    /// Event types, comma-separated (e.g. new_funding_round)
    #[arg(long)]
    pub events: String,
}

#[derive(Args, Debug)]
pub struct EnrollArgs {
    #[command(flatten)]
    pub target: EventArgs,

    /// Name for this subscription
    #[arg(long)]
    pub key: String,
}

impl EventArgs {
    fn lists(&self) -> Result<(Vec<String>, Vec<String>), CliError> {
        let ids = split_list(&self.ids);
        let events = split_list(&self.events);
        if ids.is_empty() {
            return Err(CliError::args("--ids is empty"));
        }
        if events.is_empty() {
            return Err(CliError::args("--events is empty"));
        }
        Ok((ids, events))
    }
}

pub fn run(cmd: EventCommands, app: &App, api: &EntityApi) -> Result<(), CliError> {
    match cmd {
        EventCommands::List(args) => {
            let (ids, events) = args.lists()?;
            emit_call(app, "list events", |_| api.list_events(&ids, &events))
        }
        EventCommands::Enroll(args) => {
            let (ids, events) = args.target.lists()?;
            if args.key.trim().is_empty() {
                return Err(CliError::args("--key is empty"));
            }
            emit_call(app, "enroll events", |_| api.enroll_events(&ids, &events, args.key.trim()))
        }
        EventCommands::Enrollments => emit_call(app, "list enrollments", |_| api.list_enrollments()),
    }
}
