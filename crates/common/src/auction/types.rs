//! Core types shared by the fan-out, the adapters and the bidder exchange.

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::openrtb::{App, BidRequest, BidResponse, Device, Format, Site, User};

/// Media type enumeration.
///
/// Declaration order is the canonical order used when an ad unit is split
/// into one impression per media type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
    Audio,
    Native,
}

/// Video placement requirements carried over from the impression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    pub mimes: Vec<String>,
    pub min_duration: Option<i32>,
    pub max_duration: Option<i32>,
    pub start_delay: Option<i32>,
    pub playback_method: Option<Vec<i32>>,
    pub protocols: Option<Vec<i32>>,
}

/// One bidder's view of one impression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdUnitBid {
    /// Bidder code this ad unit bid is routed to
    pub bidder_code: String,
    /// Exchange-assigned bid identifier, echoed back on the canonical bid
    pub bid_id: String,
    /// Ad unit code; equals the impression id
    pub ad_unit_code: String,
    pub instl: Option<i32>,
    pub top_frame: Option<i32>,
    /// Fixed banner sizes, in request order
    pub sizes: Vec<Format>,
    pub media_types: BTreeSet<MediaType>,
    pub video: Option<VideoParams>,
    /// Opaque partner parameters
    pub params: Option<Value>,
}

/// All ad unit bids routed to one bidder for one auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bidder {
    pub bidder_code: String,
    pub ad_unit_bids: Vec<AdUnitBid>,
}

/// Client SDK identification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdk {
    pub source: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
}

/// Auction-wide data shared with every adapter call.
///
/// Built once per auction and only ever borrowed by adapters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Transaction id; becomes the id of every outbound wire request
    pub transaction_id: String,
    pub timeout_ms: Option<i64>,
    pub secure: Option<i32>,
    pub app: Option<App>,
    /// Site skeleton (id, domain, page) when the auction comes from a site
    pub site: Option<Site>,
    pub device: Option<Device>,
    pub user: Option<User>,
    pub sdk: Option<Sdk>,
}

/// How a partner syncs user ids with the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersyncInfo {
    pub url: String,
    #[serde(rename = "type")]
    pub sync_type: String,
    pub support_cors: bool,
}

impl UsersyncInfo {
    /// Redirect-style usersync without CORS support.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sync_type: "redirect".to_string(),
            support_cors: false,
        }
    }
}

/// Outbound partner request: one endpoint, its headers, one bid request.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub uri: String,
    pub headers: HeaderMap,
    pub bid_request: BidRequest,
}

/// A wire request paired with the partner response it produced.
#[derive(Debug, Clone)]
pub struct ExchangeCall {
    pub bid_request: BidRequest,
    pub bid_response: BidResponse,
}

/// Canonical bid handed back to the auction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    /// Bidder code of the originating ad unit bid
    pub bidder: String,
    pub bid_id: String,
    /// Ad unit code (impression id)
    pub code: String,
    /// Bid price in CPM
    pub price: f64,
    pub adm: Option<String>,
    pub creative_id: Option<String>,
    pub media_type: MediaType,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub deal_id: Option<String>,
    /// Key/value pairs for the publisher ad server
    pub ad_server_targeting: Option<HashMap<String, String>>,
}

/// Status of a bidder call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    /// Call completed with at least one bid
    Success,
    /// Call completed without bids
    NoBid,
    /// Call failed and the failure was isolated to this bidder
    Error,
}

/// Outcome of one bidder call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidderResponse {
    pub bidder: String,
    pub bids: Vec<Bid>,
    pub status: BidStatus,
    /// Failures recorded for a bidder that tolerates errors
    pub errors: Vec<String>,
    pub response_time_ms: u64,
}

impl BidderResponse {
    /// Create a response carrying bids, or a no-bid response when empty.
    pub fn from_bids(bidder: impl Into<String>, bids: Vec<Bid>, response_time_ms: u64) -> Self {
        let status = if bids.is_empty() {
            BidStatus::NoBid
        } else {
            BidStatus::Success
        };
        Self {
            bidder: bidder.into(),
            bids,
            status,
            errors: Vec::new(),
            response_time_ms,
        }
    }

    /// Create an error response with no bids.
    pub fn error(bidder: impl Into<String>, message: String, response_time_ms: u64) -> Self {
        Self {
            bidder: bidder.into(),
            bids: Vec::new(),
            status: BidStatus::Error,
            errors: vec![message],
            response_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_order_is_canonical() {
        let types: BTreeSet<MediaType> = [MediaType::Native, MediaType::Video, MediaType::Banner]
            .into_iter()
            .collect();
        let ordered: Vec<MediaType> = types.into_iter().collect();
        assert_eq!(
            ordered,
            [MediaType::Banner, MediaType::Video, MediaType::Native]
        );
    }

    #[test]
    fn test_usersync_info_serializes_type() {
        let info = UsersyncInfo::redirect("https://sync.example/p");
        let json = serde_json::to_value(&info).expect("should serialize usersync info");
        assert_eq!(json["type"], "redirect");
        assert_eq!(json["support_cors"], false);
    }

    #[test]
    fn test_bidder_response_status() {
        assert_eq!(
            BidderResponse::from_bids("rubicon", Vec::new(), 3).status,
            BidStatus::NoBid
        );
        let failed = BidderResponse::error("rubicon", "boom".to_string(), 3);
        assert_eq!(failed.status, BidStatus::Error);
        assert_eq!(failed.errors, ["boom"]);
    }
}
