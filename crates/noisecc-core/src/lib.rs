pub mod catalog;
pub mod config;
pub mod correlator;
pub mod engine;
pub mod error;
pub mod executor;
pub mod normalizer;
pub mod operators;
pub mod pipelines;
pub mod report;
pub mod resolver;
pub mod stacker;
pub mod types;
