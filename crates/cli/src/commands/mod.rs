//! Subcommand handlers. `businesses` and `prospects` share the flows in
//! [`flows`]; they differ only in flags and in how flags become a row.

pub mod businesses;
pub mod config;
pub mod events;
pub mod flows;
pub mod prospects;
pub mod webhooks;
