//! Bidder adapter framework.
//!
//! This module provides the pieces between a validated auction request and
//! the partner wire formats:
//! - [`fanout`] splits the request into per-bidder ad unit bids
//! - [`adapter`] defines the per-partner capability set
//! - [`catalog`] holds the adapters registered by bidder code
//! - [`exchange`] runs a bidder call and applies its error policy
//!
//! Individual partner adapters live in the `integrations` module
//! (e.g., `crate::integrations::rubicon`).

use crate::settings::Settings;
use std::sync::Arc;

pub mod adapter;
pub mod catalog;
pub mod exchange;
pub mod fanout;
pub mod types;

pub use adapter::Adapter;
pub use catalog::BidderCatalog;
pub use exchange::{request_all_bids, request_bids, HttpTransport};
pub use types::{
    AdUnitBid, Bid, Bidder, BidderResponse, BidStatus, ExchangeCall, MediaType, RequestContext,
    UsersyncInfo, WireRequest,
};

/// Type alias for adapter builder functions.
type AdapterBuilder = fn(&Settings) -> Vec<Arc<dyn Adapter>>;

/// Returns the list of all available adapter builder functions.
///
/// Each builder checks the settings for its partner configuration and returns
/// the adapter when it is enabled.
fn adapter_builders() -> &'static [AdapterBuilder] {
    &[crate::integrations::rubicon::register_adapters]
}

/// Build the bidder catalog for the current settings.
///
/// The catalog is immutable once built and can be shared across auctions.
#[must_use]
pub fn build_catalog(settings: &Settings) -> BidderCatalog {
    log::info!("Building bidder catalog");

    let mut catalog = BidderCatalog::new();
    for builder in adapter_builders() {
        for adapter in builder(settings) {
            catalog.register(adapter);
        }
    }

    log::info!(
        "Bidder catalog built with {} adapters: [{}]",
        catalog.len(),
        catalog.names().collect::<Vec<_>>().join(", ")
    );

    catalog
}
