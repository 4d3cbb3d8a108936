// Library interface for sherlock modules
// This allows tests and other binaries to import modules

pub mod digest;
pub mod ingestion;
pub mod links;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod scraping;
pub mod sentiment;
