use clap::{Args, Subcommand};
use explorium_client::WebhookApi;

use super::flows::emit_call;
use crate::app::App;
use crate::{CliError, GlobalArgs};

#[derive(Subcommand, Debug)]
pub enum WebhookCommands {
    /// Register a webhook URL for a partner
    Create(WebhookUrlArgs),

    /// Show a partner's webhook
    Get(PartnerArgs),

    /// Change a partner's webhook URL
    Update(WebhookUrlArgs),

    /// Remove a partner's webhook
    Delete(PartnerArgs),
}

#[derive(Args, Debug)]
pub struct PartnerArgs {
    #[arg(long)]
    pub partner_id: String,
}

#[derive(Args, Debug)]
pub struct WebhookUrlArgs {
    #[arg(long)]
    pub partner_id: String,

    /// URL that receives enrichment events
    #[arg(long)]
    pub url: String,
}

pub fn run(cmd: WebhookCommands, global: &GlobalArgs) -> Result<(), CliError> {
    let app = App::load(global)?;
    let api = WebhookApi::new(app.client()?);

    match &cmd {
        WebhookCommands::Create(args) => {
            emit_call(&app, "create webhook", |_| api.create(&args.partner_id, &args.url))
        }
        WebhookCommands::Get(args) => emit_call(&app, "get webhook", |_| api.get(&args.partner_id)),
        WebhookCommands::Update(args) => {
            emit_call(&app, "update webhook", |_| api.update(&args.partner_id, &args.url))
        }
        WebhookCommands::Delete(args) => {
            emit_call(&app, "delete webhook", |_| api.delete(&args.partner_id))
        }
    }
}
