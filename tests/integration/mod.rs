//! Integration tests for the resource-tree browser core

mod config_integration;
mod local_browser;
mod population_flow;
mod reconciliation_order;
mod test_utils;
mod watch_bridge;
