//! Error types for the exchange core.
//!
//! Every fallible operation returns `Result<T, Report<ExchangeError>>`. The
//! variants mirror the two failure tiers of an auction: request-level
//! validation errors that fail the whole auction, and bidder-level errors that
//! are attributed to a single adapter.

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ExchangeError {
    /// The inbound auction request failed structural validation.
    #[display("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Partner parameters on an ad unit are missing or malformed.
    #[display("Invalid {bidder} params: {message}")]
    InvalidBidderParams { bidder: String, message: String },

    /// No usable impression could be built for the bidder.
    #[display("Invalid {bidder} ad unit: {message}")]
    InvalidAdUnit { bidder: String, message: String },

    /// The partner responded with something that cannot be mapped back.
    #[display("Bad {bidder} response: {message}")]
    BadResponse { bidder: String, message: String },

    /// The transport failed to deliver a wire request.
    #[display("Transport error for {bidder}: {message}")]
    Transport { bidder: String, message: String },

    #[display("Configuration error: {message}")]
    Configuration { message: String },

    #[display("Serialization error: {message}")]
    Serialization { message: String },
}

impl ExchangeError {
    /// Bidder code the error is attributed to, if any.
    #[must_use]
    pub fn bidder(&self) -> Option<&str> {
        match self {
            Self::InvalidBidderParams { bidder, .. }
            | Self::InvalidAdUnit { bidder, .. }
            | Self::BadResponse { bidder, .. }
            | Self::Transport { bidder, .. } => Some(bidder),
            Self::InvalidRequest { .. }
            | Self::Configuration { .. }
            | Self::Serialization { .. } => None,
        }
    }
}
