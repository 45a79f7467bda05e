//! End-to-end flow: validate, fan out, build wire requests, extract bids.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use error_stack::Report;
use rtb_exchange_common::auction::{
    build_catalog, fanout, request_all_bids, Adapter, BidStatus, ExchangeCall, HttpTransport,
    MediaType, WireRequest,
};
use rtb_exchange_common::error::ExchangeError;
use rtb_exchange_common::integrations::rubicon::size;
use rtb_exchange_common::openrtb::{BidRequest, BidResponse};
use rtb_exchange_common::settings::Settings;
use rtb_exchange_common::validation::{RequestValidator, SchemaParamValidator, ValidationResult};
use serde_json::json;

const SETTINGS: &str = r#"
    [exchange]
    default_timeout_ms = 1000

    [adapters.rubicon]
    endpoint = "https://rubicon.test/a/api/exchange.json"
    usersync_url = "https://rubicon.test/sync"
    xapi_username = "user"
    xapi_password = "password"
"#;

struct CannedTransport {
    response: BidResponse,
    sent: Mutex<Vec<WireRequest>>,
}

#[async_trait]
impl HttpTransport for CannedTransport {
    async fn send(&self, request: &WireRequest) -> Result<BidResponse, Report<ExchangeError>> {
        self.sent
            .lock()
            .expect("should lock sent requests")
            .push(request.clone());
        Ok(self.response.clone())
    }
}

fn app_request() -> BidRequest {
    serde_json::from_value(json!({
        "id": "abc",
        "tmax": 100,
        "app": {"bundle": "com.example.app"},
        "imp": [{
            "id": "unit1",
            "banner": {"format": [{"w": 300, "h": 250}]},
            "ext": {"rubicon": {"accountId": 1, "siteId": 2, "zoneId": 3}}
        }]
    }))
    .expect("should parse request")
}

fn canned_response() -> BidResponse {
    serde_json::from_value(json!({
        "id": "abc",
        "seatbid": [{"bid": [{"impid": "unit1", "price": 1.5}]}]
    }))
    .expect("should parse response")
}

#[test]
fn test_app_request_flows_through_rubicon() {
    let settings = Settings::from_toml(SETTINGS).expect("should parse settings");
    let catalog = build_catalog(&settings);
    let validator = RequestValidator::new(
        Arc::new(catalog.clone()),
        Arc::new(SchemaParamValidator::bundled().expect("bundled schemas should parse")),
    );

    let request = app_request();
    assert_eq!(validator.validate(&request), ValidationResult::Success);

    let context = fanout::request_context(&request, settings.exchange.default_timeout_ms);
    let bidders = fanout::bidders(&request);
    assert_eq!(bidders.len(), 1);

    let adapter = catalog
        .adapter_by_name("rubicon")
        .expect("rubicon should be registered");
    let requests = adapter
        .make_http_requests(&bidders[0], &context)
        .expect("should build wire requests");
    assert_eq!(requests.len(), 1);

    let wire = serde_json::to_value(&requests[0].bid_request).expect("should serialize");
    assert_eq!(wire["imp"].as_array().map(Vec::len), Some(1));
    assert_eq!(wire["imp"][0]["ext"]["rp"]["zone_id"], 3);
    assert_eq!(
        wire["imp"][0]["banner"]["ext"]["rp"]["size_id"],
        size::to_id(300, 250)
    );
    assert_eq!(wire["tmax"], 100);
    assert_eq!(wire["app"]["publisher"]["ext"]["rp"]["account_id"], 1);

    let call = ExchangeCall {
        bid_request: requests[0].bid_request.clone(),
        bid_response: canned_response(),
    };
    let bids = adapter
        .extract_bids(&bidders[0], &call)
        .expect("should extract bids");
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].price, 1.5);
    assert_eq!(bids[0].media_type, MediaType::Banner);
    assert_eq!(bids[0].bid_id, bidders[0].ad_unit_bids[0].bid_id);
}

#[test]
fn test_request_all_bids_over_transport() {
    let settings = Settings::from_toml(SETTINGS).expect("should parse settings");
    let catalog = build_catalog(&settings);
    let request = app_request();
    let context = fanout::request_context(&request, settings.exchange.default_timeout_ms);
    let bidders = fanout::bidders(&request);
    let transport = CannedTransport {
        response: canned_response(),
        sent: Mutex::new(Vec::new()),
    };

    let responses = tokio_test::block_on(request_all_bids(
        &catalog, &bidders, &context, &transport,
    ))
    .expect("rubicon tolerates errors");

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].status, BidStatus::Success);
    assert_eq!(responses[0].bids[0].code, "unit1");

    let sent = transport.sent.lock().expect("should lock sent requests");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].uri, "https://rubicon.test/a/api/exchange.json");
    assert_eq!(sent[0].bid_request.id, "abc");
}

#[test]
fn test_invalid_request_stops_before_bidders() {
    let settings = Settings::from_toml(SETTINGS).expect("should parse settings");
    let catalog = build_catalog(&settings);
    let validator = RequestValidator::new(
        Arc::new(catalog),
        Arc::new(SchemaParamValidator::bundled().expect("bundled schemas should parse")),
    );

    let mut request = app_request();
    request.site = Some(Default::default());

    let err = validator
        .validate(&request)
        .into_result()
        .expect_err("site and app together are invalid");
    assert_eq!(
        err.current_context().to_string(),
        "Invalid request: request.site or request.app must be defined, but not both."
    );
}
