//! Stratus - API Management service broker command line
//!
//! The binary is a thin adapter: it reads one broker request as JSON, runs a
//! single verb through [`stratus_broker::ApiManagementBroker`] and prints the
//! reply as JSON. Shared pieces live here so they can be tested without a
//! process boundary.

pub mod cli;
