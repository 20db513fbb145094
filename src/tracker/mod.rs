pub mod audit;
pub mod chunk;
pub mod config;
pub mod cycle;
pub mod names;
pub mod notifier;
pub mod paths;
pub mod reconcile;
pub mod report;
pub mod roster;
pub mod schedule;
pub mod scraper;
pub mod state;
pub mod util;
