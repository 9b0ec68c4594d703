// Allow dead code for public API functions that may not be used internally
// but are part of the library's exposed interface
#![allow(dead_code)]

pub mod browser;
pub mod cli;
pub mod collector;
pub mod config;
pub mod events;
pub mod export;
pub mod fetcher;
pub mod input;
pub mod logger;
pub mod lookup;
pub mod query_id;
pub mod region;
pub mod run_state;
pub mod sink;

pub use region::{classify, Region};
pub use run_state::{EnrichedRecord, SharedRunState};
