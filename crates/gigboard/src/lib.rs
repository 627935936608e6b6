//! Core of the gigboard freelance marketplace: entity lifecycle, moderation,
//! proposal workflow, rating aggregation, and discovery.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
