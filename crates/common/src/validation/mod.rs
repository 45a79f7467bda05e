//! Structural validation of inbound auction requests.
//!
//! [`RequestValidator::validate`] checks a canonical bid request before any
//! bidder is contacted. Checks run in a fixed order and stop at the first
//! failure, so a result carries exactly one message.

use std::sync::Arc;

use error_stack::Report;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ExchangeError;
use crate::openrtb::{Audio, Banner, BidRequest, Format, Imp, Pmp, Site, User, Video};

pub mod bidder_params;

pub use bidder_params::{BidderParamValidator, ParamSchema, SchemaParamValidator};

/// Reserved `imp.ext` key that is never a bidder.
const PREBID_EXT: &str = "prebid";

/// Answers whether a bidder code is known to the exchange.
pub trait BidderRegistry: Send + Sync {
    fn is_valid_name(&self, name: &str) -> bool;
}

/// Outcome of validating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Success,
    Error(String),
}

impl ValidationResult {
    #[must_use]
    pub fn success() -> Self {
        Self::Success
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Error(message) => Some(message),
        }
    }

    /// Convert into a `Result` for callers propagating with `?`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRequest`] carrying the failure message.
    pub fn into_result(self) -> Result<(), Report<ExchangeError>> {
        match self {
            Self::Success => Ok(()),
            Self::Error(message) => Err(Report::new(ExchangeError::InvalidRequest { message })),
        }
    }
}

impl From<Result<(), String>> for ValidationResult {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(message) => Self::Error(message),
        }
    }
}

/// `user.ext` as far as validation is concerned.
#[derive(Debug, Deserialize)]
struct ExtUser {
    digitrust: Option<ExtUserDigiTrust>,
}

#[derive(Debug, Deserialize)]
struct ExtUserDigiTrust {
    /// Absent means the user did not opt out.
    #[serde(default)]
    pref: i32,
}

pub struct RequestValidator {
    registry: Arc<dyn BidderRegistry>,
    param_validator: Arc<dyn BidderParamValidator>,
}

impl RequestValidator {
    pub fn new(
        registry: Arc<dyn BidderRegistry>,
        param_validator: Arc<dyn BidderParamValidator>,
    ) -> Self {
        Self {
            registry,
            param_validator,
        }
    }

    /// Validate `request`, reporting only the first problem found.
    #[must_use]
    pub fn validate(&self, request: &BidRequest) -> ValidationResult {
        let result = self.validate_request(request);
        if let Err(message) = &result {
            log::debug!("Request {} failed validation: {}", request.id, message);
        }
        result.into()
    }

    fn validate_request(&self, request: &BidRequest) -> Result<(), String> {
        if is_blank(Some(request.id.as_str())) {
            return Err(r#"request missing required field: "id""#.to_string());
        }

        if let Some(tmax) = request.tmax.filter(|tmax| *tmax < 0) {
            return Err(format!("request.tmax must be nonnegative. Got {tmax}"));
        }

        if request.imp.is_empty() {
            return Err("request.imp must contain at least one element.".to_string());
        }

        for (index, imp) in request.imp.iter().enumerate() {
            self.validate_imp(imp, index)?;
        }

        if request.site.is_some() == request.app.is_some() {
            return Err("request.site or request.app must be defined, but not both.".to_string());
        }

        validate_site(request.site.as_ref())?;
        validate_user(request.user.as_ref())
    }

    fn validate_imp(&self, imp: &Imp, index: usize) -> Result<(), String> {
        if is_blank(Some(imp.id.as_str())) {
            return Err(format!(r#"request.imp[{index}] missing required field: "id""#));
        }

        if imp.metric.as_ref().is_some_and(|metric| !metric.is_empty()) {
            return Err(format!(
                "request.imp[{index}].metric is not yet supported by prebid-server. \
                 Support may be added in the future."
            ));
        }

        if imp.banner.is_none() && imp.video.is_none() && imp.audio.is_none() && imp.native.is_none()
        {
            return Err(format!(
                r#"request.imp[{index}] must contain at least one of "banner", "video", "audio", or "native""#
            ));
        }

        validate_banner(imp.banner.as_ref(), index)?;
        validate_video_mimes(imp.video.as_ref(), index)?;
        validate_audio_mimes(imp.audio.as_ref(), index)?;

        if let Some(native) = &imp.native {
            if is_blank(native.request.as_deref()) {
                return Err(format!(
                    "request.imp[{index}].native.request must be a JSON encoded string \
                     conforming to the openrtb 1.2 Native spec"
                ));
            }
        }

        validate_pmp(imp.pmp.as_ref(), index)?;
        self.validate_imp_ext(imp.ext.as_ref(), index)
    }

    fn validate_imp_ext(&self, ext: Option<&Map<String, Value>>, index: usize) -> Result<(), String> {
        let Some(ext) = ext.filter(|ext| !ext.is_empty()) else {
            return Err(format!(
                "request.imp[{index}].ext must contain at least one bidder"
            ));
        };

        for (bidder, params) in ext {
            if self.registry.is_valid_name(bidder) {
                let messages = self.param_validator.validate(bidder, params);
                if !messages.is_empty() {
                    let joined = messages.into_iter().collect::<Vec<_>>().join("\n");
                    return Err(format!(
                        "request.imp[{index}].ext.{bidder} failed validation.\n{joined}"
                    ));
                }
            } else if bidder != PREBID_EXT {
                return Err(format!(
                    "request.imp[{index}].ext contains unknown bidder: {bidder}"
                ));
            }
        }

        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}

fn has_value(value: Option<i32>) -> bool {
    value.is_some_and(|v| v != 0)
}

fn validate_banner(banner: Option<&Banner>, imp_index: usize) -> Result<(), String> {
    let Some(formats) = banner.and_then(|banner| banner.format.as_ref()) else {
        return Ok(());
    };

    formats
        .iter()
        .enumerate()
        .try_for_each(|(format_index, format)| validate_format(format, imp_index, format_index))
}

fn validate_format(format: &Format, imp_index: usize, format_index: usize) -> Result<(), String> {
    let uses_h = has_value(format.h);
    let uses_w = has_value(format.w);
    let uses_wmin = has_value(format.wmin);
    let uses_wratio = has_value(format.wratio);
    let uses_hratio = has_value(format.hratio);
    let uses_hw = uses_h || uses_w;
    let uses_ratios = uses_wmin || uses_wratio || uses_hratio;

    let prefix = format!("Request imp[{imp_index}].banner.format[{format_index}]");

    if uses_hw && uses_ratios {
        return Err(format!(
            "{prefix} should define *either* {{w, h}} *or* {{wmin, wratio, hratio}}, but not both. \
             If both are valid, send two \"format\" objects in the request."
        ));
    }

    if !uses_hw && !uses_ratios {
        return Err(format!(
            "{prefix} should define *either* {{w, h}} (for static size requirements) \
             *or* {{wmin, wratio, hratio}} (for flexible sizes) to be non-zero."
        ));
    }

    if uses_hw && !(uses_h && uses_w) {
        return Err(format!(
            "{prefix} must define non-zero \"h\" and \"w\" properties."
        ));
    }

    if uses_ratios && !(uses_wmin && uses_wratio && uses_hratio) {
        return Err(format!(
            "{prefix} must define non-zero \"wmin\", \"wratio\", and \"hratio\" properties."
        ));
    }

    Ok(())
}

fn validate_mimes(mimes: Option<&Vec<String>>, message: impl FnOnce() -> String) -> Result<(), String> {
    if mimes.is_none_or(|mimes| mimes.is_empty()) {
        return Err(message());
    }
    Ok(())
}

fn validate_video_mimes(video: Option<&Video>, index: usize) -> Result<(), String> {
    let Some(video) = video else {
        return Ok(());
    };
    validate_mimes(video.mimes.as_ref(), || {
        format!("request.imp[{index}].video.mimes must contain at least one supported MIME type")
    })
}

fn validate_audio_mimes(audio: Option<&Audio>, index: usize) -> Result<(), String> {
    let Some(audio) = audio else {
        return Ok(());
    };
    validate_mimes(audio.mimes.as_ref(), || {
        format!("request.imp[{index}].audio.mimes must contain at least one supported MIME type")
    })
}

fn validate_pmp(pmp: Option<&Pmp>, imp_index: usize) -> Result<(), String> {
    let Some(deals) = pmp.and_then(|pmp| pmp.deals.as_ref()) else {
        return Ok(());
    };

    match deals.iter().position(|deal| is_blank(deal.id.as_deref())) {
        Some(deal_index) => Err(format!(
            r#"request.imp[{imp_index}].pmp.deals[{deal_index}] missing required field: "id""#
        )),
        None => Ok(()),
    }
}

fn validate_site(site: Option<&Site>) -> Result<(), String> {
    match site {
        Some(site) if is_blank(site.id.as_deref()) && is_blank(site.page.as_deref()) => Err(
            "request.site should include at least one of request.site.id or request.site.page."
                .to_string(),
        ),
        _ => Ok(()),
    }
}

fn validate_user(user: Option<&User>) -> Result<(), String> {
    let Some(ext) = user.and_then(|user| user.ext.as_ref()) else {
        return Ok(());
    };

    let ext_user: ExtUser = serde_json::from_value(ext.clone())
        .map_err(|_| "request.user.ext object is not valid.".to_string())?;

    match ext_user.digitrust {
        Some(digitrust) if digitrust.pref == 0 => Ok(()),
        _ => Err("request.user contains a digitrust object that is not valid.".to_string()),
    }
}
