//! Property-based tests for path translation and tree reconciliation

mod tree_properties;
