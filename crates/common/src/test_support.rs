#[cfg(test)]
pub mod tests {
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use error_stack::Report;
    use serde_json::Value;

    use crate::auction::types::{AdUnitBid, Bidder, MediaType, RequestContext, WireRequest};
    use crate::auction::{BidderCatalog, HttpTransport};
    use crate::error::ExchangeError;
    use crate::integrations::rubicon::{RubiconAdapter, RubiconConfig};
    use crate::openrtb::{BidResponse, Device, Format, Site, User};
    use crate::settings::Settings;
    use crate::validation::{RequestValidator, SchemaParamValidator};

    pub fn crate_test_settings_str() -> String {
        r#"
            [exchange]
            default_timeout_ms = 500

            [adapters.rubicon]
            enabled = true
            endpoint = "https://rubicon.test/a/api/exchange.json"
            usersync_url = "https://rubicon.test/sync?p=prebid"
            xapi_username = "test-user"
            xapi_password = "test-password"
            "#
        .to_string()
    }

    pub fn create_test_settings() -> Settings {
        let toml_str = crate_test_settings_str();
        Settings::from_toml(&toml_str).expect("Invalid config")
    }

    pub fn rubicon_config() -> RubiconConfig {
        create_test_settings()
            .adapter_config::<RubiconConfig>("rubicon")
            .expect("should parse rubicon config")
            .expect("rubicon should be enabled")
    }

    pub fn rubicon_adapter() -> RubiconAdapter {
        RubiconAdapter::new(&rubicon_config()).expect("should create rubicon adapter")
    }

    /// Banner ad unit bid for rubicon sized 300x250, without params.
    pub fn ad_unit_bid(code: &str) -> AdUnitBid {
        AdUnitBid {
            bidder_code: "rubicon".to_string(),
            bid_id: format!("bid-{code}"),
            ad_unit_code: code.to_string(),
            instl: None,
            top_frame: None,
            sizes: vec![Format::sized(300, 250)],
            media_types: BTreeSet::from([MediaType::Banner]),
            video: None,
            params: None,
        }
    }

    /// Rubicon bidder with a single banner ad unit `unit1` carrying `params`.
    pub fn rubicon_bidder(params: Value) -> Bidder {
        let mut unit = ad_unit_bid("unit1");
        unit.params = Some(params);
        Bidder {
            bidder_code: "rubicon".to_string(),
            ad_unit_bids: vec![unit],
        }
    }

    pub fn test_context() -> RequestContext {
        RequestContext {
            transaction_id: "tid-0001".to_string(),
            timeout_ms: Some(1000),
            secure: Some(1),
            app: None,
            site: Some(Site {
                domain: Some("publisher.example".to_string()),
                page: Some("https://publisher.example/article".to_string()),
                ..Site::default()
            }),
            device: Some(Device {
                ua: Some("Mozilla/5.0 (test)".to_string()),
                ip: Some("192.0.2.1".to_string()),
                pxratio: Some(2.0),
                ..Device::default()
            }),
            user: Some(User {
                buyeruid: Some("rubicon-uid".to_string()),
                ..User::default()
            }),
            sdk: None,
        }
    }

    pub fn test_validator() -> RequestValidator {
        let mut catalog = BidderCatalog::new();
        catalog.register(Arc::new(rubicon_adapter()));
        let schemas = SchemaParamValidator::bundled().expect("bundled schemas should parse");
        RequestValidator::new(Arc::new(catalog), Arc::new(schemas))
    }

    /// Transport that records every request and answers with a canned response.
    pub struct MockTransport {
        response: Option<BidResponse>,
        sent: Mutex<Vec<WireRequest>>,
    }

    impl MockTransport {
        pub fn replying(response: BidResponse) -> Self {
            Self {
                response: Some(response),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                response: None,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn sent(&self) -> Vec<WireRequest> {
            self.sent.lock().expect("should lock sent requests").clone()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: &WireRequest) -> Result<BidResponse, Report<ExchangeError>> {
            self.sent
                .lock()
                .expect("should lock sent requests")
                .push(request.clone());

            self.response.clone().ok_or_else(|| {
                Report::new(ExchangeError::Transport {
                    bidder: "mock".to_string(),
                    message: "connection refused".to_string(),
                })
            })
        }
    }
}
