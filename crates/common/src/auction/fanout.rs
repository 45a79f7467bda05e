//! Splits a validated canonical request into per-bidder work.
//!
//! Each impression is routed to every bidder named in its `ext`; the reserved
//! `prebid` key is not a bidder. Bidders keep the order in which they first
//! appear in the request.

use std::collections::BTreeSet;

use serde_json::Value;
use uuid::Uuid;

use crate::openrtb::{BidRequest, Format, Imp, Site};

use super::types::{AdUnitBid, Bidder, MediaType, RequestContext, Sdk, VideoParams};

/// Reserved `imp.ext` key carrying exchange options rather than bidder params.
pub const PREBID_EXT: &str = "prebid";

/// Build the shared context for all adapter calls of this auction.
///
/// `default_timeout_ms` applies when the request carries no `tmax`.
#[must_use]
pub fn request_context(request: &BidRequest, default_timeout_ms: u32) -> RequestContext {
    RequestContext {
        transaction_id: request.id.clone(),
        timeout_ms: Some(request.tmax.unwrap_or_else(|| i64::from(default_timeout_ms))),
        secure: request.imp.iter().find_map(|imp| imp.secure),
        app: request.app.clone(),
        site: request.site.as_ref().map(site_skeleton),
        device: request.device.clone(),
        user: request.user.clone(),
        sdk: sdk_from_request(request),
    }
}

/// Group impressions by bidder code.
#[must_use]
pub fn bidders(request: &BidRequest) -> Vec<Bidder> {
    let mut bidders: Vec<Bidder> = Vec::new();

    for imp in &request.imp {
        let Some(ext) = &imp.ext else {
            continue;
        };

        for (bidder_code, params) in ext {
            if bidder_code == PREBID_EXT {
                continue;
            }

            let ad_unit_bid = ad_unit_bid(imp, bidder_code, params);
            match bidders.iter_mut().find(|b| &b.bidder_code == bidder_code) {
                Some(bidder) => bidder.ad_unit_bids.push(ad_unit_bid),
                None => bidders.push(Bidder {
                    bidder_code: bidder_code.clone(),
                    ad_unit_bids: vec![ad_unit_bid],
                }),
            }
        }
    }

    log::debug!(
        "Fan-out of request {} produced {} bidders",
        request.id,
        bidders.len()
    );

    bidders
}

fn ad_unit_bid(imp: &Imp, bidder_code: &str, params: &Value) -> AdUnitBid {
    AdUnitBid {
        bidder_code: bidder_code.to_string(),
        bid_id: Uuid::new_v4().to_string(),
        ad_unit_code: imp.id.clone(),
        instl: imp.instl,
        top_frame: imp.banner.as_ref().and_then(|b| b.topframe),
        sizes: fixed_sizes(imp),
        media_types: media_types(imp),
        video: imp.video.as_ref().map(|video| VideoParams {
            mimes: video.mimes.clone().unwrap_or_default(),
            min_duration: video.minduration,
            max_duration: video.maxduration,
            start_delay: video.startdelay,
            playback_method: video.playbackmethod.clone(),
            protocols: video.protocols.clone(),
        }),
        params: (!params.is_null()).then(|| params.clone()),
    }
}

/// Fixed `{w, h}` sizes of the impression; flexible formats carry no size.
fn fixed_sizes(imp: &Imp) -> Vec<Format> {
    let Some(banner) = &imp.banner else {
        return Vec::new();
    };

    let mut sizes: Vec<Format> = banner
        .format
        .iter()
        .flatten()
        .filter_map(|format| match (format.w, format.h) {
            (Some(w), Some(h)) if w != 0 && h != 0 => Some(Format::sized(w, h)),
            _ => None,
        })
        .collect();

    if sizes.is_empty() {
        if let (Some(w), Some(h)) = (banner.w, banner.h) {
            sizes.push(Format::sized(w, h));
        }
    }

    sizes
}

fn media_types(imp: &Imp) -> BTreeSet<MediaType> {
    let mut media_types = BTreeSet::new();
    if imp.banner.is_some() {
        media_types.insert(MediaType::Banner);
    }
    if imp.video.is_some() {
        media_types.insert(MediaType::Video);
    }
    if imp.audio.is_some() {
        media_types.insert(MediaType::Audio);
    }
    if imp.native.is_some() {
        media_types.insert(MediaType::Native);
    }
    media_types
}

fn site_skeleton(site: &Site) -> Site {
    Site {
        id: site.id.clone(),
        domain: site.domain.clone(),
        page: site.page.clone(),
        ..Site::default()
    }
}

/// SDK info sent by mobile clients under `app.ext.prebid`.
fn sdk_from_request(request: &BidRequest) -> Option<Sdk> {
    let prebid = request.app.as_ref()?.ext.as_ref()?.get(PREBID_EXT)?;
    let field = |name: &str| prebid.get(name).and_then(Value::as_str).map(str::to_string);

    Some(Sdk {
        source: field("source"),
        platform: request
            .device
            .as_ref()
            .and_then(|device| device.extra.get("os"))
            .and_then(Value::as_str)
            .map(str::to_string),
        version: field("version"),
    })
}
