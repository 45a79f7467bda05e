//! Rubicon parameter and extension types.
//!
//! Inbound params use the publisher-facing camelCase names; every extension
//! sent to or received from the partner lives under an `rp` object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Params a publisher configures for a Rubicon ad unit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubiconParams {
    pub account_id: Option<i32>,
    pub site_id: Option<i32>,
    pub zone_id: Option<i32>,
    /// First-party inventory key/values, passed through as `imp.ext.rp.target`
    pub inventory: Option<Value>,
    /// First-party visitor key/values, passed through as `user.ext.rp.target`
    pub visitor: Option<Value>,
    pub video: Option<RubiconVideoParams>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RubiconVideoParams {
    pub skip: Option<i32>,
    pub skipdelay: Option<i32>,
    #[serde(rename = "size_id")]
    pub size_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RubiconImpExt {
    pub rp: RubiconImpExtRp,
}

#[derive(Debug, Serialize)]
pub struct RubiconImpExtRp {
    pub zone_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
    pub track: RubiconImpExtRpTrack,
}

#[derive(Debug, Serialize)]
pub struct RubiconImpExtRpTrack {
    pub mint: String,
    pub mint_version: String,
}

#[derive(Debug, Serialize)]
pub struct RubiconBannerExt {
    pub rp: RubiconBannerExtRp,
}

#[derive(Debug, Serialize)]
pub struct RubiconBannerExtRp {
    pub size_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_size_ids: Option<Vec<i32>>,
    pub mime: String,
}

#[derive(Debug, Serialize)]
pub struct RubiconVideoExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipdelay: Option<i32>,
    pub rp: RubiconVideoExtRp,
}

#[derive(Debug, Serialize)]
pub struct RubiconVideoExtRp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct RubiconSiteExt {
    pub rp: RubiconSiteExtRp,
}

#[derive(Debug, Serialize)]
pub struct RubiconSiteExtRp {
    pub site_id: i32,
}

#[derive(Debug, Serialize)]
pub struct RubiconPubExt {
    pub rp: RubiconPubExtRp,
}

#[derive(Debug, Serialize)]
pub struct RubiconPubExtRp {
    pub account_id: i32,
}

#[derive(Debug, Serialize)]
pub struct RubiconDeviceExt {
    pub rp: RubiconDeviceExtRp,
}

#[derive(Debug, Serialize)]
pub struct RubiconDeviceExtRp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixelratio: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RubiconUserExt {
    pub rp: RubiconUserExtRp,
}

#[derive(Debug, Serialize)]
pub struct RubiconUserExtRp {
    pub target: Value,
}

/// `bid.ext` returned by the partner.
#[derive(Debug, Deserialize)]
pub struct RubiconTargetingExt {
    pub rp: Option<RubiconTargetingExtRp>,
}

#[derive(Debug, Deserialize)]
pub struct RubiconTargetingExtRp {
    pub targeting: Option<Vec<RubiconTargeting>>,
}

#[derive(Debug, Deserialize)]
pub struct RubiconTargeting {
    pub key: String,
    #[serde(default)]
    pub values: Vec<String>,
}
