//! Rubicon Project adapter.
//!
//! Speaks the Rubicon flavour of OpenRTB 2.5: one impression per wire
//! request, partner identifiers carried in `rp` extensions, and sizes
//! expressed through the partner's size taxonomy (see [`size`]).

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use error_stack::{Report, ResultExt};
use http::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use validator::Validate;

use crate::auction::adapter::{
    allowed_media_types, banner_builder, default_headers, device_builder, lookup_ad_unit_bid,
    source_builder, user_builder, validate_ad_unit_media_types, video_builder,
};
use crate::auction::types::{
    AdUnitBid, Bid, Bidder, ExchangeCall, MediaType, RequestContext, UsersyncInfo, WireRequest,
};
use crate::auction::Adapter;
use crate::error::ExchangeError;
use crate::openrtb::{self, App, Banner, BidRequest, Content, Device, Imp, Publisher, Site, User, Video};
use crate::settings::{AdapterConfig, Settings};

pub mod model;
pub mod size;

use model::{
    RubiconBannerExt, RubiconBannerExtRp, RubiconDeviceExt, RubiconDeviceExtRp, RubiconImpExt,
    RubiconImpExtRp, RubiconImpExtRpTrack, RubiconParams, RubiconPubExt, RubiconPubExtRp,
    RubiconSiteExt, RubiconSiteExtRp, RubiconTargetingExt, RubiconUserExt, RubiconUserExtRp,
    RubiconVideoExt, RubiconVideoExtRp, RubiconVideoParams,
};

pub const RUBICON_CODE: &str = "rubicon";

const ALLOWED_MEDIA_TYPES: &[MediaType] = &[MediaType::Banner, MediaType::Video];
const PREBID_SERVER_USER_AGENT: &str = "prebid-server/1.0";
const MINT: &str = "prebid";
const BANNER_MIME: &str = "text/html";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RubiconConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Partner exchange endpoint
    #[validate(url)]
    pub endpoint: String,
    #[validate(url)]
    pub usersync_url: String,
    #[validate(length(min = 1))]
    pub xapi_username: String,
    #[validate(length(min = 1))]
    pub xapi_password: String,
}

impl AdapterConfig for RubiconConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

fn default_enabled() -> bool {
    true
}

/// Params that passed the presence checks.
struct ValidatedParams {
    account_id: i32,
    site_id: i32,
    zone_id: i32,
    inventory: Option<Value>,
    visitor: Option<Value>,
    video: Option<RubiconVideoParams>,
}

pub struct RubiconAdapter {
    endpoint_url: String,
    usersync_info: UsersyncInfo,
    headers: HeaderMap,
}

impl RubiconAdapter {
    /// Create the adapter from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] when the endpoint is not an
    /// absolute URL or the credentials cannot form a header value.
    pub fn new(config: &RubiconConfig) -> Result<Self, Report<ExchangeError>> {
        Url::parse(&config.endpoint).change_context(
            ExchangeError::Configuration {
                message: format!("Invalid rubicon endpoint URL: {}", config.endpoint),
            },
        )?;

        let credentials = BASE64.encode(format!(
            "{}:{}",
            config.xapi_username, config.xapi_password
        ));
        let auth_header = HeaderValue::from_str(&format!("Basic {credentials}")).change_context(
            ExchangeError::Configuration {
                message: "Invalid rubicon XAPI credentials".to_string(),
            },
        )?;

        let mut headers = default_headers();
        headers.insert(header::AUTHORIZATION, auth_header);
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(PREBID_SERVER_USER_AGENT),
        );

        Ok(Self {
            endpoint_url: config.endpoint.clone(),
            usersync_info: UsersyncInfo::redirect(config.usersync_url.clone()),
            headers,
        })
    }

    fn create_bid_requests(
        &self,
        ad_unit_bid: &AdUnitBid,
        context: &RequestContext,
    ) -> Result<Vec<BidRequest>, Report<ExchangeError>> {
        let params = parse_and_validate_params(ad_unit_bid)?;

        make_imps(ad_unit_bid, &params, context)?
            .into_iter()
            .map(|imp| -> Result<BidRequest, Report<ExchangeError>> {
                Ok(BidRequest {
                    id: context.transaction_id.clone(),
                    imp: vec![imp],
                    app: make_app(&params, context)?,
                    site: Some(make_site(&params, context)?),
                    device: Some(make_device(context)?),
                    user: Some(make_user(&params, context)?),
                    source: Some(source_builder(context)),
                    at: Some(1),
                    tmax: context.timeout_ms,
                    ..BidRequest::default()
                })
            })
            .collect()
    }
}

impl Adapter for RubiconAdapter {
    fn code(&self) -> &'static str {
        RUBICON_CODE
    }

    fn cookie_family(&self) -> &'static str {
        RUBICON_CODE
    }

    fn usersync_info(&self) -> &UsersyncInfo {
        &self.usersync_info
    }

    fn tolerate_errors(&self) -> bool {
        true
    }

    fn make_http_requests(
        &self,
        bidder: &Bidder,
        context: &RequestContext,
    ) -> Result<Vec<WireRequest>, Report<ExchangeError>> {
        validate_ad_unit_media_types(RUBICON_CODE, &bidder.ad_unit_bids, ALLOWED_MEDIA_TYPES)?;

        let mut requests = Vec::new();
        for ad_unit_bid in &bidder.ad_unit_bids {
            for bid_request in self.create_bid_requests(ad_unit_bid, context)? {
                requests.push(WireRequest {
                    uri: self.endpoint_url.clone(),
                    headers: self.headers.clone(),
                    bid_request,
                });
            }
        }

        if requests.is_empty() {
            return Err(Report::new(ExchangeError::InvalidAdUnit {
                bidder: RUBICON_CODE.to_string(),
                message: "Invalid ad unit/imp".to_string(),
            }));
        }

        log::debug!(
            "rubicon: built {} wire requests for {} ad units",
            requests.len(),
            bidder.ad_unit_bids.len()
        );

        Ok(requests)
    }

    fn extract_bids(
        &self,
        bidder: &Bidder,
        exchange_call: &ExchangeCall,
    ) -> Result<Vec<Bid>, Report<ExchangeError>> {
        // One bid per request/response pair.
        let Some((bid, price)) = exchange_call
            .bid_response
            .bids()
            .find_map(|bid| bid.price.filter(|price| *price != 0.0).map(|price| (bid, price)))
        else {
            return Ok(Vec::new());
        };

        let ad_unit_bid = lookup_ad_unit_bid(RUBICON_CODE, &bidder.ad_unit_bids, &bid.impid)?;

        Ok(vec![Bid {
            bidder: ad_unit_bid.bidder_code.clone(),
            bid_id: ad_unit_bid.bid_id.clone(),
            code: bid.impid.clone(),
            price,
            adm: bid.adm.clone(),
            creative_id: bid.crid.clone(),
            media_type: media_type_for(&exchange_call.bid_request),
            width: bid.w,
            height: bid.h,
            deal_id: bid.dealid.clone(),
            ad_server_targeting: ad_server_targeting(bid),
        }])
    }
}

fn invalid_params(message: impl Into<String>) -> Report<ExchangeError> {
    Report::new(ExchangeError::InvalidBidderParams {
        bidder: RUBICON_CODE.to_string(),
        message: message.into(),
    })
}

fn parse_and_validate_params(
    ad_unit_bid: &AdUnitBid,
) -> Result<ValidatedParams, Report<ExchangeError>> {
    let params = ad_unit_bid
        .params
        .as_ref()
        .ok_or_else(|| invalid_params("Rubicon params section is missing"))?;

    let params: RubiconParams =
        serde_json::from_value(params.clone()).map_err(|e| invalid_params(e.to_string()))?;

    let present = |value: Option<i32>| value.filter(|id| *id != 0);
    let account_id =
        present(params.account_id).ok_or_else(|| invalid_params("Missing accountId param"))?;
    let site_id = present(params.site_id).ok_or_else(|| invalid_params("Missing siteId param"))?;
    let zone_id = present(params.zone_id).ok_or_else(|| invalid_params("Missing zoneId param"))?;

    Ok(ValidatedParams {
        account_id,
        site_id,
        zone_id,
        inventory: params.inventory.filter(|v| !v.is_null()),
        visitor: params.visitor.filter(|v| !v.is_null()),
        video: params.video,
    })
}

fn is_valid_media_type(media_type: MediaType, ad_unit_bid: &AdUnitBid) -> bool {
    match media_type {
        MediaType::Banner => !size::valid_size_ids(&ad_unit_bid.sizes).is_empty(),
        MediaType::Video => ad_unit_bid
            .video
            .as_ref()
            .is_some_and(|video| !video.mimes.is_empty()),
        MediaType::Audio | MediaType::Native => false,
    }
}

fn make_imps(
    ad_unit_bid: &AdUnitBid,
    params: &ValidatedParams,
    context: &RequestContext,
) -> Result<Vec<Imp>, Report<ExchangeError>> {
    allowed_media_types(ad_unit_bid, ALLOWED_MEDIA_TYPES)
        .into_iter()
        .filter(|media_type| is_valid_media_type(*media_type, ad_unit_bid))
        .map(|media_type| -> Result<Imp, Report<ExchangeError>> {
            let mut imp = Imp {
                id: ad_unit_bid.ad_unit_code.clone(),
                secure: context.secure,
                instl: ad_unit_bid.instl,
                ext: Some(to_ext_object(&make_imp_ext(params, context))?),
                ..Imp::default()
            };
            match media_type {
                MediaType::Banner => imp.banner = Some(make_banner(ad_unit_bid)?),
                MediaType::Video => imp.video = Some(make_video(ad_unit_bid, params)?),
                MediaType::Audio | MediaType::Native => {}
            }
            Ok(imp)
        })
        .collect()
}

fn make_imp_ext(params: &ValidatedParams, context: &RequestContext) -> RubiconImpExt {
    let mint_version = match &context.sdk {
        Some(sdk) => format!(
            "{}_{}_{}",
            sdk.source.as_deref().unwrap_or_default(),
            sdk.platform.as_deref().unwrap_or_default(),
            sdk.version.as_deref().unwrap_or_default()
        ),
        None => "__".to_string(),
    };

    RubiconImpExt {
        rp: RubiconImpExtRp {
            zone_id: params.zone_id,
            target: params.inventory.clone(),
            track: RubiconImpExtRpTrack {
                mint: MINT.to_string(),
                mint_version,
            },
        },
    }
}

fn make_banner(ad_unit_bid: &AdUnitBid) -> Result<Banner, Report<ExchangeError>> {
    let size_ids = size::valid_size_ids(&ad_unit_bid.sizes);
    let Some((&primary, alternates)) = size_ids.split_first() else {
        return Err(Report::new(ExchangeError::InvalidAdUnit {
            bidder: RUBICON_CODE.to_string(),
            message: format!("No valid sizes for ad unit {}", ad_unit_bid.ad_unit_code),
        }));
    };

    let ext = RubiconBannerExt {
        rp: RubiconBannerExtRp {
            size_id: primary,
            alt_size_ids: (!alternates.is_empty()).then(|| alternates.to_vec()),
            mime: BANNER_MIME.to_string(),
        },
    };

    Ok(Banner {
        ext: Some(to_ext(&ext)?),
        ..banner_builder(ad_unit_bid)
    })
}

fn make_video(
    ad_unit_bid: &AdUnitBid,
    params: &ValidatedParams,
) -> Result<Video, Report<ExchangeError>> {
    let ext = params
        .video
        .as_ref()
        .map(|video| {
            to_ext(&RubiconVideoExt {
                skip: video.skip,
                skipdelay: video.skipdelay,
                rp: RubiconVideoExtRp {
                    size_id: video.size_id,
                },
            })
        })
        .transpose()?;

    Ok(Video {
        ext,
        ..video_builder(ad_unit_bid)
    })
}

fn make_publisher(params: &ValidatedParams) -> Result<Publisher, Report<ExchangeError>> {
    let ext = RubiconPubExt {
        rp: RubiconPubExtRp {
            account_id: params.account_id,
        },
    };
    Ok(Publisher {
        ext: Some(to_ext(&ext)?),
        ..Publisher::default()
    })
}

fn make_site_ext(params: &ValidatedParams) -> Result<Value, Report<ExchangeError>> {
    to_ext(&RubiconSiteExt {
        rp: RubiconSiteExtRp {
            site_id: params.site_id,
        },
    })
}

fn make_app(
    params: &ValidatedParams,
    context: &RequestContext,
) -> Result<Option<App>, Report<ExchangeError>> {
    let Some(app) = &context.app else {
        return Ok(None);
    };

    Ok(Some(App {
        publisher: Some(make_publisher(params)?),
        ext: Some(make_site_ext(params)?),
        ..app.clone()
    }))
}

fn make_site(
    params: &ValidatedParams,
    context: &RequestContext,
) -> Result<Site, Report<ExchangeError>> {
    let mut site = context.site.clone().unwrap_or_default();

    if context.app.is_some() {
        site.content = Some(Content {
            language: context.user.as_ref().and_then(|user| user.language.clone()),
            ..Content::default()
        });
    } else {
        site.publisher = Some(make_publisher(params)?);
        site.ext = Some(make_site_ext(params)?);
    }

    Ok(site)
}

fn make_device(context: &RequestContext) -> Result<Device, Report<ExchangeError>> {
    let ext = RubiconDeviceExt {
        rp: RubiconDeviceExtRp {
            pixelratio: context.device.as_ref().and_then(|device| device.pxratio),
        },
    };

    Ok(Device {
        ext: Some(to_ext(&ext)?),
        ..device_builder(context)
    })
}

fn make_user(
    params: &ValidatedParams,
    context: &RequestContext,
) -> Result<User, Report<ExchangeError>> {
    let mut user = user_builder(context);

    if let Some(visitor) = &params.visitor {
        user.ext = Some(to_ext(&RubiconUserExt {
            rp: RubiconUserExtRp {
                target: visitor.clone(),
            },
        })?);
    }

    Ok(user)
}

fn media_type_for(bid_request: &BidRequest) -> MediaType {
    match bid_request.imp.first() {
        Some(imp) if imp.video.is_some() => MediaType::Video,
        _ => MediaType::Banner,
    }
}

fn ad_server_targeting(bid: &openrtb::Bid) -> Option<HashMap<String, String>> {
    let ext = bid.ext.as_ref()?;

    let targeting_ext = match serde_json::from_value::<RubiconTargetingExt>(ext.clone()) {
        Ok(targeting_ext) => targeting_ext,
        Err(e) => {
            log::warn!("Exception occurred while de-serializing rubicon targeting extension: {e}");
            return None;
        }
    };

    let targeting = targeting_ext.rp?.targeting?;
    Some(
        targeting
            .into_iter()
            .filter_map(|t| {
                let value = t.values.into_iter().next()?;
                Some((t.key, value))
            })
            .collect(),
    )
}

fn to_ext<T: Serialize>(ext: &T) -> Result<Value, Report<ExchangeError>> {
    serde_json::to_value(ext).change_context(ExchangeError::Serialization {
        message: "Failed to serialize rubicon extension".to_string(),
    })
}

fn to_ext_object<T: Serialize>(ext: &T) -> Result<Map<String, Value>, Report<ExchangeError>> {
    match to_ext(ext)? {
        Value::Object(map) => Ok(map),
        _ => Err(Report::new(ExchangeError::Serialization {
            message: "Rubicon imp extension must be an object".to_string(),
        })),
    }
}

/// Register the Rubicon adapter when it is configured and enabled.
#[must_use]
pub fn register_adapters(settings: &Settings) -> Vec<Arc<dyn Adapter>> {
    let config = match settings.adapter_config::<RubiconConfig>(RUBICON_CODE) {
        Ok(Some(config)) => config,
        Ok(None) => {
            log::info!("Rubicon adapter not registered: adapter not found or disabled");
            return Vec::new();
        }
        Err(e) => {
            log::error!("Rubicon adapter not registered: config error: {e:?}");
            return Vec::new();
        }
    };

    match RubiconAdapter::new(&config) {
        Ok(adapter) => {
            log::info!(
                "Registering Rubicon adapter (endpoint={})",
                config.endpoint
            );
            vec![Arc::new(adapter) as Arc<dyn Adapter>]
        }
        Err(e) => {
            log::error!("Rubicon adapter not registered: {e:?}");
            Vec::new()
        }
    }
}
