//! One bidder's request/response cycle and its error policy.
//!
//! The exchange drives `make_http_requests`, hands every wire request to the
//! transport, and feeds each response into `extract_bids`. Deadlines are the
//! caller's concern: wrap the returned future in whatever timeout the auction
//! enforces.

use std::time::Instant;

use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use futures::future::join_all;

use crate::error::ExchangeError;
use crate::openrtb::BidResponse;

use super::adapter::Adapter;
use super::catalog::BidderCatalog;
use super::types::{Bid, Bidder, BidderResponse, ExchangeCall, RequestContext, WireRequest};

/// Delivers wire requests to partners.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one wire request and return the partner's parsed response.
    async fn send(&self, request: &WireRequest) -> Result<BidResponse, Report<ExchangeError>>;
}

/// Run one bidder call and apply the adapter's `tolerate_errors` policy.
///
/// # Errors
///
/// Propagates the failure only when the adapter does not tolerate errors;
/// otherwise the failure is recorded on an empty [`BidderResponse`].
pub async fn request_bids(
    adapter: &dyn Adapter,
    bidder: &Bidder,
    context: &RequestContext,
    transport: &dyn HttpTransport,
) -> Result<BidderResponse, Report<ExchangeError>> {
    let start_time = Instant::now();
    let result = call_bidder(adapter, bidder, context, transport).await;
    let response_time_ms = start_time.elapsed().as_millis() as u64;

    match result {
        Ok(bids) => {
            log::info!(
                "{} returned {} bids in {}ms",
                adapter.code(),
                bids.len(),
                response_time_ms
            );
            Ok(BidderResponse::from_bids(
                adapter.code(),
                bids,
                response_time_ms,
            ))
        }
        Err(report) if adapter.tolerate_errors() => {
            log::warn!("{} failed, continuing without its bids: {:?}", adapter.code(), report);
            Ok(BidderResponse::error(
                adapter.code(),
                report.current_context().to_string(),
                response_time_ms,
            ))
        }
        Err(report) => Err(report),
    }
}

async fn call_bidder(
    adapter: &dyn Adapter,
    bidder: &Bidder,
    context: &RequestContext,
    transport: &dyn HttpTransport,
) -> Result<Vec<Bid>, Report<ExchangeError>> {
    let requests = adapter.make_http_requests(bidder, context)?;
    log::debug!(
        "{}: sending {} wire requests",
        adapter.code(),
        requests.len()
    );

    let responses = join_all(requests.iter().map(|request| transport.send(request))).await;

    let mut bids = Vec::new();
    for (request, response) in requests.into_iter().zip(responses) {
        let bid_response = response.attach(format!("uri: {}", request.uri))?;
        let exchange_call = ExchangeCall {
            bid_request: request.bid_request,
            bid_response,
        };
        bids.extend(adapter.extract_bids(bidder, &exchange_call)?);
    }

    Ok(bids)
}

/// Run every bidder concurrently against the adapters in `catalog`.
///
/// Bidders without a registered adapter are skipped.
///
/// # Errors
///
/// Returns the first failure of an adapter that does not tolerate errors.
pub async fn request_all_bids(
    catalog: &BidderCatalog,
    bidders: &[Bidder],
    context: &RequestContext,
    transport: &dyn HttpTransport,
) -> Result<Vec<BidderResponse>, Report<ExchangeError>> {
    let calls = bidders.iter().filter_map(|bidder| {
        let Some(adapter) = catalog.adapter_by_name(&bidder.bidder_code) else {
            log::warn!("No adapter registered for bidder {}", bidder.bidder_code);
            return None;
        };
        Some(request_bids(adapter.as_ref(), bidder, context, transport))
    });

    join_all(calls).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::types::{BidStatus, UsersyncInfo};
    use crate::test_support::tests::{
        rubicon_adapter, rubicon_bidder, test_context, MockTransport,
    };
    use serde_json::json;
    use std::sync::Arc;

    /// Adapter whose failures are fatal to the auction.
    struct StrictAdapter {
        usersync_info: UsersyncInfo,
    }

    impl Adapter for StrictAdapter {
        fn code(&self) -> &'static str {
            "strict"
        }

        fn cookie_family(&self) -> &'static str {
            "strict"
        }

        fn usersync_info(&self) -> &UsersyncInfo {
            &self.usersync_info
        }

        fn tolerate_errors(&self) -> bool {
            false
        }

        fn make_http_requests(
            &self,
            _bidder: &Bidder,
            _context: &RequestContext,
        ) -> Result<Vec<WireRequest>, Report<ExchangeError>> {
            Err(Report::new(ExchangeError::InvalidAdUnit {
                bidder: "strict".to_string(),
                message: "Invalid ad unit/imp".to_string(),
            }))
        }

        fn extract_bids(
            &self,
            _bidder: &Bidder,
            _exchange_call: &ExchangeCall,
        ) -> Result<Vec<Bid>, Report<ExchangeError>> {
            Ok(Vec::new())
        }
    }

    fn response(value: serde_json::Value) -> BidResponse {
        serde_json::from_value(value).expect("should parse response")
    }

    #[test]
    fn test_request_bids_returns_extracted_bids() {
        let adapter = rubicon_adapter();
        let bidder = rubicon_bidder(json!({"accountId": 1, "siteId": 2, "zoneId": 3}));
        let transport = MockTransport::replying(response(json!({
            "id": "abc",
            "seatbid": [{"bid": [{"impid": "unit1", "price": 1.5, "crid": "c1"}]}]
        })));

        let result = tokio_test::block_on(request_bids(
            &adapter,
            &bidder,
            &test_context(),
            &transport,
        ))
        .expect("should succeed");

        assert_eq!(result.status, BidStatus::Success);
        assert_eq!(result.bids.len(), 1);
        assert_eq!(result.bids[0].price, 1.5);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_tolerated_build_failure_degrades_to_empty_bids() {
        let adapter = rubicon_adapter();
        assert!(adapter.tolerate_errors());
        let bidder = rubicon_bidder(json!({"accountId": 1, "siteId": 2}));
        let transport = MockTransport::replying(BidResponse::default());

        let result = tokio_test::block_on(request_bids(
            &adapter,
            &bidder,
            &test_context(),
            &transport,
        ))
        .expect("tolerated failure should not propagate");

        assert_eq!(result.status, BidStatus::Error);
        assert!(result.bids.is_empty());
        assert_eq!(result.errors, ["Invalid rubicon params: Missing zoneId param"]);
        assert!(transport.sent().is_empty(), "nothing is sent on build failure");
    }

    #[test]
    fn test_tolerated_transport_failure_degrades_to_empty_bids() {
        let adapter = rubicon_adapter();
        let bidder = rubicon_bidder(json!({"accountId": 1, "siteId": 2, "zoneId": 3}));
        let transport = MockTransport::failing();

        let result = tokio_test::block_on(request_bids(
            &adapter,
            &bidder,
            &test_context(),
            &transport,
        ))
        .expect("tolerated failure should not propagate");

        assert_eq!(result.status, BidStatus::Error);
        assert!(result.bids.is_empty());
    }

    #[test]
    fn test_intolerant_adapter_failure_propagates() {
        let adapter = StrictAdapter {
            usersync_info: UsersyncInfo::redirect("https://sync.example"),
        };
        let mut bidder = rubicon_bidder(json!({}));
        bidder.bidder_code = "strict".to_string();
        let transport = MockTransport::replying(BidResponse::default());

        let err = tokio_test::block_on(request_bids(
            &adapter,
            &bidder,
            &test_context(),
            &transport,
        ))
        .expect_err("failure should be fatal");

        assert_eq!(err.current_context().bidder(), Some("strict"));
    }

    #[test]
    fn test_request_all_bids_skips_unknown_bidders() {
        let mut catalog = BidderCatalog::new();
        catalog.register(Arc::new(rubicon_adapter()));

        let mut unknown = rubicon_bidder(json!({}));
        unknown.bidder_code = "appnexus".to_string();
        let bidders = vec![
            rubicon_bidder(json!({"accountId": 1, "siteId": 2, "zoneId": 3})),
            unknown,
        ];
        let transport = MockTransport::replying(BidResponse::default());

        let responses = tokio_test::block_on(request_all_bids(
            &catalog,
            &bidders,
            &test_context(),
            &transport,
        ))
        .expect("should succeed");

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].bidder, "rubicon");
        assert_eq!(responses[0].status, BidStatus::NoBid);
    }
}
