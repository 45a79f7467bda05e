//! Trait definition for bidder adapters, plus the OpenRTB building blocks
//! shared by adapters that speak OpenRTB to their partner.

use error_stack::Report;
use http::header::{self, HeaderMap, HeaderValue};

use crate::error::ExchangeError;
use crate::openrtb::{Banner, Device, Source, User, Video};

use super::types::{
    AdUnitBid, Bid, Bidder, ExchangeCall, MediaType, RequestContext, UsersyncInfo, WireRequest,
};

/// Trait implemented by every demand partner integration.
///
/// Adapters are configured once and shared across concurrent auctions, so
/// every operation takes `&self` and must not mutate adapter state.
pub trait Adapter: Send + Sync {
    /// Bidder code used in `imp.ext` (e.g., "rubicon").
    fn code(&self) -> &'static str;

    /// Cookie family used to look up the partner's user id.
    fn cookie_family(&self) -> &'static str;

    fn usersync_info(&self) -> &UsersyncInfo;

    /// Whether a failure of this partner is isolated to the partner.
    ///
    /// When `true` a failed call yields zero bids for the partner and the
    /// auction proceeds; when `false` the failure is fatal to the auction.
    fn tolerate_errors(&self) -> bool;

    /// Build the outbound wire requests for all ad units routed to this bidder.
    ///
    /// # Errors
    ///
    /// Fails the whole bidder call when partner params on any ad unit are
    /// missing or invalid, or when no impression survives filtering.
    fn make_http_requests(
        &self,
        bidder: &Bidder,
        context: &RequestContext,
    ) -> Result<Vec<WireRequest>, Report<ExchangeError>>;

    /// Map a partner response back into canonical bids.
    ///
    /// # Errors
    ///
    /// Fails when a response bid cannot be attributed to one of the bidder's
    /// ad units. Malformed per-bid extension data never fails the call.
    fn extract_bids(
        &self,
        bidder: &Bidder,
        exchange_call: &ExchangeCall,
    ) -> Result<Vec<Bid>, Report<ExchangeError>>;
}

/// Headers common to every OpenRTB partner request.
#[must_use]
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json;charset=utf-8"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Media types requested by the ad unit that the partner also supports,
/// in canonical order.
#[must_use]
pub fn allowed_media_types(ad_unit_bid: &AdUnitBid, supported: &[MediaType]) -> Vec<MediaType> {
    ad_unit_bid
        .media_types
        .iter()
        .copied()
        .filter(|media_type| supported.contains(media_type))
        .collect()
}

/// Ensure every ad unit requests at least one media type the partner supports.
///
/// # Errors
///
/// Returns [`ExchangeError::InvalidAdUnit`] naming the bidder otherwise.
pub fn validate_ad_unit_media_types(
    bidder_code: &str,
    ad_unit_bids: &[AdUnitBid],
    supported: &[MediaType],
) -> Result<(), Report<ExchangeError>> {
    let all_supported = ad_unit_bids
        .iter()
        .all(|ad_unit_bid| !allowed_media_types(ad_unit_bid, supported).is_empty());

    if all_supported {
        Ok(())
    } else {
        Err(Report::new(ExchangeError::InvalidAdUnit {
            bidder: bidder_code.to_string(),
            message: format!("One of the ad units has no media type supported by {bidder_code}"),
        }))
    }
}

/// Banner block built from the ad unit's sizes; the first size is primary.
#[must_use]
pub fn banner_builder(ad_unit_bid: &AdUnitBid) -> Banner {
    let primary = ad_unit_bid.sizes.first();
    Banner {
        w: primary.and_then(|f| f.w),
        h: primary.and_then(|f| f.h),
        format: Some(ad_unit_bid.sizes.clone()),
        topframe: ad_unit_bid.top_frame,
        ..Banner::default()
    }
}

/// Video block built from the ad unit's video params and primary size.
#[must_use]
pub fn video_builder(ad_unit_bid: &AdUnitBid) -> Video {
    let primary = ad_unit_bid.sizes.first();
    let params = ad_unit_bid.video.clone().unwrap_or_default();
    Video {
        mimes: Some(params.mimes),
        minduration: params.min_duration,
        maxduration: params.max_duration,
        startdelay: params.start_delay,
        playbackmethod: params.playback_method,
        protocols: params.protocols,
        w: primary.and_then(|f| f.w),
        h: primary.and_then(|f| f.h),
        ..Video::default()
    }
}

/// Device block seeded from the auction's device.
#[must_use]
pub fn device_builder(context: &RequestContext) -> Device {
    context.device.clone().unwrap_or_default()
}

/// User block seeded from the auction's user (buyer uid already resolved).
#[must_use]
pub fn user_builder(context: &RequestContext) -> User {
    context.user.clone().unwrap_or_default()
}

#[must_use]
pub fn source_builder(context: &RequestContext) -> Source {
    Source {
        tid: Some(context.transaction_id.clone()),
        ..Source::default()
    }
}

/// Find the ad unit bid a response bid refers to.
///
/// # Errors
///
/// Returns [`ExchangeError::BadResponse`] when no ad unit has that code.
pub fn lookup_ad_unit_bid<'a>(
    bidder_code: &str,
    ad_unit_bids: &'a [AdUnitBid],
    ad_unit_code: &str,
) -> Result<&'a AdUnitBid, Report<ExchangeError>> {
    ad_unit_bids
        .iter()
        .find(|ad_unit_bid| ad_unit_bid.ad_unit_code == ad_unit_code)
        .ok_or_else(|| {
            Report::new(ExchangeError::BadResponse {
                bidder: bidder_code.to_string(),
                message: format!("Unknown ad unit code '{ad_unit_code}'"),
            })
        })
}
