//! Cross-subsystem integration scenarios.

mod ingestion;
mod network_filter;
mod solicitation;
