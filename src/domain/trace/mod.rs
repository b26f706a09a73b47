pub mod aggregator;
pub mod message;
pub mod noise_filter;
pub mod normalizer;
pub mod orchestrator;
