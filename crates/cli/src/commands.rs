//! Request inspection commands.
//!
//! Settings are loaded from the bundled `rtb-exchange.toml` or from `--config`,
//! and merged with environment variables prefixed with `RTB_EXCHANGE__`. For
//! example, `RTB_EXCHANGE__ADAPTERS__RUBICON__ENDPOINT` overrides
//! `adapters.rubicon.endpoint`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use http::header::{self, HeaderMap};
use rtb_exchange_common::auction::{build_catalog, fanout, Adapter, BidderCatalog, ExchangeCall};
use rtb_exchange_common::openrtb::{BidRequest, BidResponse};
use rtb_exchange_common::settings::Settings;
use rtb_exchange_common::validation::{RequestValidator, SchemaParamValidator, ValidationResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CliError;

const REDACTED: &str = "[redacted]";

/// One line of `build` output.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BuiltRequest<'a> {
    Wire {
        bidder: &'a str,
        uri: String,
        headers: BTreeMap<String, String>,
        body: BidRequest,
    },
    Failed {
        bidder: &'a str,
        error: String,
    },
}

/// Load settings from `config`, or the bundled defaults when absent.
pub(crate) fn load_settings(config: Option<&Path>) -> Result<Settings, CliError> {
    let settings = match config {
        Some(path) => {
            log::info!("Loading config from: {}", path.display());
            let content = fs::read_to_string(path)?;
            Settings::from_toml(&content)?
        }
        None => {
            log::info!("Loading bundled config");
            Settings::new()?
        }
    };
    Ok(settings)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Json(format!("{}: {e}", path.display())))
}

fn request_validator(catalog: &BidderCatalog) -> Result<RequestValidator, CliError> {
    let schemas = SchemaParamValidator::bundled()?;
    Ok(RequestValidator::new(
        Arc::new(catalog.clone()),
        Arc::new(schemas),
    ))
}

/// Validate an auction request file.
pub fn validate(settings: &Settings, file: &Path) -> Result<String, CliError> {
    let request: BidRequest = read_json(file)?;
    let catalog = build_catalog(settings);

    match request_validator(&catalog)?.validate(&request) {
        ValidationResult::Success => Ok("OK".to_string()),
        ValidationResult::Error(message) => Err(CliError::Validation(message)),
    }
}

/// Validate an auction request and render the wire requests each registered
/// adapter would send, optionally restricted to one bidder.
pub fn build(
    settings: &Settings,
    file: &Path,
    only_bidder: Option<&str>,
) -> Result<String, CliError> {
    let request: BidRequest = read_json(file)?;
    let catalog = build_catalog(settings);
    request_validator(&catalog)?
        .validate(&request)
        .into_result()?;

    let context = fanout::request_context(&request, settings.exchange.default_timeout_ms);
    let bidders = fanout::bidders(&request);

    let mut output = Vec::new();
    for bidder in bidders
        .iter()
        .filter(|b| only_bidder.is_none_or(|code| b.bidder_code == code))
    {
        let Some(adapter) = catalog.adapter_by_name(&bidder.bidder_code) else {
            log::warn!("No adapter registered for bidder {}", bidder.bidder_code);
            continue;
        };

        match adapter.make_http_requests(bidder, &context) {
            Ok(requests) => output.extend(requests.into_iter().map(|request| {
                BuiltRequest::Wire {
                    bidder: adapter.code(),
                    uri: request.uri,
                    headers: printable_headers(&request.headers),
                    body: request.bid_request,
                }
            })),
            Err(report) if adapter.tolerate_errors() => {
                log::warn!("{} failed to build requests: {report:?}", adapter.code());
                output.push(BuiltRequest::Failed {
                    bidder: adapter.code(),
                    error: report.current_context().to_string(),
                });
            }
            Err(report) => return Err(report.into()),
        }
    }

    Ok(serde_json::to_string_pretty(&output)?)
}

/// Map a partner response back into canonical bids.
///
/// `ad_units` is the auction request the wire request was built from.
pub fn extract(
    settings: &Settings,
    request: &Path,
    response: &Path,
    bidder_code: &str,
    ad_units: &Path,
) -> Result<String, CliError> {
    let bid_request: BidRequest = read_json(request)?;
    let bid_response: BidResponse = read_json(response)?;
    let auction_request: BidRequest = read_json(ad_units)?;

    let catalog = build_catalog(settings);
    let adapter = catalog.adapter_by_name(bidder_code).ok_or_else(|| {
        CliError::Config(format!("No adapter registered for bidder '{bidder_code}'"))
    })?;

    let bidder = fanout::bidders(&auction_request)
        .into_iter()
        .find(|b| b.bidder_code == bidder_code)
        .ok_or_else(|| {
            CliError::Validation(format!("request has no ad units for bidder '{bidder_code}'"))
        })?;

    let bids = adapter.extract_bids(
        &bidder,
        &ExchangeCall {
            bid_request,
            bid_response,
        },
    )?;

    Ok(serde_json::to_string_pretty(&bids)?)
}

fn printable_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name == header::AUTHORIZATION {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    const SETTINGS: &str = r#"
[exchange]
default_timeout_ms = 300

[adapters.rubicon]
endpoint = "https://rubicon.test/a/api/exchange.json"
usersync_url = "https://rubicon.test/sync"
xapi_username = "user"
xapi_password = "password"
"#;

    const REQUEST: &str = r#"{
  "id": "abc",
  "site": {"page": "https://publisher.example/article"},
  "imp": [{
    "id": "unit1",
    "banner": {"format": [{"w": 300, "h": 250}, {"w": 728, "h": 90}]},
    "ext": {"rubicon": {"accountId": 1, "siteId": 2, "zoneId": 3}}
  }]
}"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("should write fixture");
        path
    }

    fn settings(dir: &TempDir) -> Settings {
        let path = write(dir, "rtb-exchange.toml", SETTINGS);
        load_settings(Some(&path)).expect("should load settings")
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = TempDir::new().expect("should create temp dir");
        assert_eq!(settings(&dir).exchange.default_timeout_ms, 300);
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let dir = TempDir::new().expect("should create temp dir");
        let path = write(&dir, "invalid.toml", "invalid { toml");
        let err = load_settings(Some(&path)).expect_err("invalid TOML should fail");
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_validate_ok_and_error() {
        let dir = TempDir::new().expect("should create temp dir");
        let settings = settings(&dir);

        let ok = write(&dir, "request.json", REQUEST);
        assert_eq!(validate(&settings, &ok).expect("should validate"), "OK");

        let bad = write(&dir, "bad.json", r#"{"id": "abc", "imp": []}"#);
        let err = validate(&settings, &bad).expect_err("empty imp should fail");
        assert_eq!(
            err.to_string(),
            "Invalid request: request.imp must contain at least one element."
        );
    }

    #[test]
    fn test_validate_malformed_json() {
        let dir = TempDir::new().expect("should create temp dir");
        let settings = settings(&dir);
        let path = write(&dir, "broken.json", "{");

        let err = validate(&settings, &path).expect_err("broken JSON should fail");
        assert!(matches!(err, CliError::Json(_)));
    }

    #[test]
    fn test_build_renders_wire_requests() {
        let dir = TempDir::new().expect("should create temp dir");
        let settings = settings(&dir);
        let path = write(&dir, "request.json", REQUEST);

        let output = build(&settings, &path, None).expect("should build");
        let value: Value = serde_json::from_str(&output).expect("output should be JSON");
        let requests = value.as_array().expect("output should be an array");

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["bidder"], "rubicon");
        assert_eq!(requests[0]["uri"], "https://rubicon.test/a/api/exchange.json");
        assert_eq!(requests[0]["headers"]["authorization"], REDACTED);
        assert_eq!(requests[0]["headers"]["user-agent"], "prebid-server/1.0");
        assert_eq!(requests[0]["body"]["tmax"], 300);
        assert_eq!(
            requests[0]["body"]["imp"][0]["banner"]["ext"]["rp"]["alt_size_ids"],
            serde_json::json!([2])
        );
    }

    #[test]
    fn test_build_bidder_filter_and_adapter_errors() {
        let dir = TempDir::new().expect("should create temp dir");
        let settings = settings(&dir);
        let path = write(&dir, "request.json", REQUEST);

        let output = build(&settings, &path, Some("appnexus")).expect("should build");
        assert_eq!(output.trim(), "[]");

        let unknown_sizes = REQUEST.replace(
            r#"[{"w": 300, "h": 250}, {"w": 728, "h": 90}]"#,
            r#"[{"w": 1, "h": 1}]"#,
        );
        let path = write(&dir, "unknown-sizes.json", &unknown_sizes);
        let output = build(&settings, &path, Some("rubicon")).expect("errors are tolerated");
        let value: Value = serde_json::from_str(&output).expect("output should be JSON");
        assert_eq!(
            value[0]["error"],
            "Invalid rubicon ad unit: Invalid ad unit/imp"
        );
    }

    #[test]
    fn test_extract_maps_response() {
        let dir = TempDir::new().expect("should create temp dir");
        let settings = settings(&dir);
        let auction = write(&dir, "request.json", REQUEST);
        let wire = write(
            &dir,
            "wire.json",
            r#"{"id": "abc", "imp": [{"id": "unit1", "banner": {"w": 300, "h": 250}}]}"#,
        );
        let response = write(
            &dir,
            "response.json",
            r#"{"id": "abc", "seatbid": [{"bid": [{"impid": "unit1", "price": 1.5, "crid": "c1"}]}]}"#,
        );

        let output =
            extract(&settings, &wire, &response, "rubicon", &auction).expect("should extract");
        let value: Value = serde_json::from_str(&output).expect("output should be JSON");

        assert_eq!(value[0]["price"], 1.5);
        assert_eq!(value[0]["code"], "unit1");
        assert_eq!(value[0]["media_type"], "banner");
        assert_eq!(value[0]["creative_id"], "c1");
    }

    #[test]
    fn test_extract_unknown_bidder() {
        let dir = TempDir::new().expect("should create temp dir");
        let settings = settings(&dir);
        let path = write(&dir, "request.json", REQUEST);

        let err = extract(&settings, &path, &path, "appnexus", &path)
            .expect_err("unknown bidder should fail");
        assert!(matches!(err, CliError::Config(_)));
    }
}
