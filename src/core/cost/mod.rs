pub mod accumulator;
pub mod ingest;
pub mod store;
