use std::time::Duration;

use anpost_common::{ApiConfig, ProxyConfig, ReturnsError, Secret};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::*;

use crate::{ApiMessage, ReturnLabelRequest, ReturnLabelResponse};

pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const RETURNS_LABEL_PATH: &str = "returnsLabel";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const UNKNOWN_ERROR: &str = "Unknown error";

/// Client for the carrier's return-label API.
pub struct LabelClient {
    http: reqwest::Client,
    base_url: String,
    subscription_key: Option<Secret<String>>,
}

impl LabelClient {
    pub fn new(api: &ApiConfig, proxy: Option<&ProxyConfig>) -> Result<Self, ReturnsError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .use_rustls_tls();
        if let Some(proxy) = proxy {
            let mut upstream =
                reqwest::Proxy::all(format!("http://{}:{}", proxy.host, proxy.port))?;
            if let Some((username, password)) = proxy.credentials() {
                upstream = upstream.basic_auth(username, password);
            }
            builder = builder.proxy(upstream);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: api.api_base_url().to_owned(),
            subscription_key: api.subscription_key.clone(),
        })
    }

    pub async fn create_return_label(
        &self,
        request: &ReturnLabelRequest,
    ) -> Result<ReturnLabelResponse, ReturnsError> {
        let Some(subscription_key) = &self.subscription_key else {
            return Err(ReturnsError::Configuration(
                "Subscription key not configured".into(),
            ));
        };
        request.validate()?;

        let url = format!("{}/{RETURNS_LABEL_PATH}", self.base_url);
        info!(order = %request.retailer_order_number, %url, "Requesting return label");
        let response = self
            .http
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        debug!(%status, "Label API responded");

        let label = handle_response(status, body)?;
        if !label.success {
            let message = label
                .errors
                .first()
                .map(ApiMessage::message)
                .unwrap_or(UNKNOWN_ERROR);
            return Err(failed(status, message));
        }
        Ok(label)
    }
}

fn handle_response(status: StatusCode, body: Value) -> Result<ReturnLabelResponse, ReturnsError> {
    match status.as_u16() {
        200..=299 => Ok(serde_json::from_value(body)?),
        400 => Err(ReturnsError::Validation(error_message(&body))),
        401 => Err(ReturnsError::Configuration(
            "Invalid subscription key".into(),
        )),
        404 => Err(ReturnsError::api(Some(404), "Resource not found")),
        407 => Err(ReturnsError::Configuration(
            "Proxy authentication required".into(),
        )),
        _ => Err(failed(status, &error_message(&body))),
    }
}

fn failed(status: StatusCode, message: &str) -> ReturnsError {
    ReturnsError::api(
        Some(status.as_u16()),
        format!(
            "API request failed with status {}: {message}",
            status.as_u16()
        ),
    )
}

/// Picks the most specific message out of an error body.
fn error_message(body: &Value) -> String {
    let first_error = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|entry| entry.as_str().or_else(|| entry.get("message")?.as_str()));
    first_error
        .or_else(|| body.get("message").and_then(Value::as_str))
        .or_else(|| body.get("error").and_then(Value::as_str))
        .unwrap_or(UNKNOWN_ERROR)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const KEY: &str = "test-subscription-key";

    fn request() -> ReturnLabelRequest {
        serde_json::from_value(json!({
            "output_response_type": "Label",
            "sender": {
                "first_name": "Jane",
                "last_name": "Smith",
                "contact_number": "0871234567",
                "email_address": "test@email.com"
            },
            "sender_address": {
                "address_line1": "Exo Building",
                "address_line2": "North Wall Quay",
                "city": "Dublin 1",
                "eircode": "D01 W5Y2",
                "county": "Dublin",
                "country": "Ireland",
                "countrycode": "IE"
            },
            "retailer_account_no": "test_account",
            "retailer_return_reason": "Does not fit",
            "retailer_order_number": "987654321"
        }))
        .unwrap()
    }

    fn client(server: &MockServer) -> LabelClient {
        let api = ApiConfig {
            subscription_key: Some(Secret::new(KEY.into())),
            test: true,
            base_url: Some(server.base_url()),
        };
        LabelClient::new(&api, None).unwrap()
    }

    async fn respond(status: u16, body: Value) -> Result<ReturnLabelResponse, ReturnsError> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/returnsLabel");
                then.status(status)
                    .header("content-type", "application/json")
                    .json_body(body);
            })
            .await;
        let result = client(&server).create_return_label(&request()).await;
        mock.assert_async().await;
        result
    }

    #[tokio::test]
    async fn test_create_return_label() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/returnsLabel")
                    .header(SUBSCRIPTION_KEY_HEADER, KEY)
                    .header("content-type", "application/json")
                    .header("accept", "application/json")
                    .json_body(serde_json::to_value(request()).unwrap());
                then.status(200).json_body(json!({
                    "trackingNumber": "CH000100026IE",
                    "labelData": "[PDF bitstream]",
                    "posLabelPrintingBarcode": "PSS502177250027472",
                    "success": true,
                    "transactionReference": "PSS50217725",
                    "errors": []
                }));
            })
            .await;

        let label = client(&server)
            .create_return_label(&request())
            .await
            .unwrap();
        mock.assert_async().await;
        assert!(label.success);
        assert_eq!(label.tracking_number.as_deref(), Some("CH000100026IE"));
        assert_eq!(label.transaction_reference.as_deref(), Some("PSS50217725"));
        assert!(label.errors.is_empty());
    }

    #[tokio::test]
    async fn test_bad_request_is_validation_error() {
        let err = respond(
            400,
            json!({
                "success": false,
                "errors": [{"message": "The Direct Returns Retailer with Account Number: 37408681 cannot be found"}]
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ReturnsError::Validation(ref m)
                if m == "The Direct Returns Retailer with Account Number: 37408681 cannot be found"
        ));
    }

    #[tokio::test]
    async fn test_unsuccessful_ok_response() {
        let err = respond(
            200,
            json!({"success": false, "errors": [{"message": "Invalid parameters"}]}),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "API request failed with status 200: Invalid parameters"
        );
        assert!(matches!(err, ReturnsError::Api { status: Some(200), .. }));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let err = respond(401, json!({})).await.unwrap_err();
        assert!(matches!(err, ReturnsError::Configuration(ref m) if m == "Invalid subscription key"));

        let err = respond(404, json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Resource not found");

        let err = respond(407, json!({})).await.unwrap_err();
        assert!(
            matches!(err, ReturnsError::Configuration(ref m) if m == "Proxy authentication required")
        );

        let err = respond(500, json!({"message": "boom"})).await.unwrap_err();
        assert_eq!(err.to_string(), "API request failed with status 500: boom");

        let err = respond(503, json!({})).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "API request failed with status 503: Unknown error"
        );
    }

    #[tokio::test]
    async fn test_missing_subscription_key() {
        let api = ApiConfig {
            base_url: Some("http://127.0.0.1:9".into()),
            ..Default::default()
        };
        let client = LabelClient::new(&api, None).unwrap();
        let err = client.create_return_label(&request()).await.unwrap_err();
        assert!(matches!(err, ReturnsError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/returnsLabel");
                then.status(200);
            })
            .await;
        let mut request = request();
        request.retailer_order_number.clear();
        let err = client(&server)
            .create_return_label(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, ReturnsError::Validation(_)));
        mock.assert_hits_async(0).await;
    }

    #[test]
    fn test_error_message_precedence() {
        assert_eq!(error_message(&json!({"errors": ["first", "second"]})), "first");
        assert_eq!(
            error_message(&json!({"message": "m", "error": "e"})),
            "m"
        );
        assert_eq!(error_message(&json!({"error": "e"})), "e");
        assert_eq!(error_message(&Value::Null), UNKNOWN_ERROR);
    }

    #[test]
    fn test_client_with_proxy() {
        let proxy = ProxyConfig {
            host: "proxy.example.com".into(),
            port: 3128,
            username: Some("user".into()),
            password: Some(Secret::new("pass".into())),
        };
        let client = LabelClient::new(&ApiConfig::default(), Some(&proxy)).unwrap();
        assert_eq!(client.base_url, anpost_common::PRODUCTION_API_BASE_URL);
    }
}
