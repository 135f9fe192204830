pub mod audit;
pub mod collector;
pub mod config;
pub mod directory;
pub mod document;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod paths;
pub mod pipeline;
pub mod render;
pub mod schedule;
pub mod store;
pub mod summarize;
pub mod summary;
pub mod tokens;
pub mod util;
pub mod watcher;

#[cfg(test)]
pub mod testutil;
