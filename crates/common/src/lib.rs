//! Core of the RTB exchange.
//!
//! This crate validates inbound OpenRTB auction requests and translates them
//! into the wire formats of individual demand partners.
//!
//! # Modules
//!
//! - [`auction`]: Bidder fan-out, the adapter trait, the catalog and the bidder exchange
//! - [`error`]: Error types and error handling utilities
//! - [`integrations`]: Demand partner adapters
//! - [`openrtb`]: OpenRTB 2.5 request and response types
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities and mocks
//! - [`validation`]: Structural request validation and bidder param schemas

pub mod auction;
pub mod error;
pub mod integrations;
pub mod openrtb;
pub mod settings;
pub mod test_support;
pub mod validation;
