//! CLI domain: parse, route, output and presentation only.
//! Orchestration lives in `Browser`; the route table only wires it up.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_listing_json, format_listing_text, format_report_text, format_tree_json,
    format_tree_text,
};
pub use route::RunContext;
