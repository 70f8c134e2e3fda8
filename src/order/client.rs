//! HTTP client for wallet sign-in and the vote order lifecycle

use super::models::{
    ApiEnvelope, ConfirmOrderRequest, ConfirmResult, CreateOrderRequest, OrderData, OrderStatus,
    SignInMessage, SignInRequest, SignInToken, VoteOrder,
};
use super::OrderService;
use crate::config::ApiConfig;
use crate::error::{VoterError, VoterResult};
use crate::wallet::Wallet;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const WALLET_TYPE: &str = "ETHEREUM_BASED";

pub struct OrderClient {
    http: Client,
    base_url: String,
}

impl OrderClient {
    pub fn new(config: &ApiConfig) -> VoterResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Message the service wants signed for `address`
    pub async fn sign_in_message(&self, address: &str) -> VoterResult<String> {
        let response = self
            .http
            .get(self.url("/auths/wallets/sign-in/message"))
            .query(&[("address", address), ("type", WALLET_TYPE)])
            .send()
            .await?;

        let envelope: ApiEnvelope<SignInMessage> =
            read_json(response, &[StatusCode::OK], "sign-in message").await?;
        if envelope.data.message.is_empty() {
            return Err(VoterError::Api("Empty sign-in message received".to_string()));
        }

        Ok(envelope.data.message)
    }

    /// Exchange a signed message for an access token
    pub async fn authenticate(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> VoterResult<String> {
        let body = SignInRequest {
            address,
            message,
            signature,
            kind: WALLET_TYPE,
        };

        let response = self
            .http
            .post(self.url("/auths/wallets/sign-in"))
            .json(&body)
            .send()
            .await?;

        let envelope: ApiEnvelope<SignInToken> = read_json(
            response,
            &[StatusCode::OK, StatusCode::CREATED],
            "sign-in",
        )
        .await?;
        if envelope.data.token.is_empty() {
            return Err(VoterError::Api("Empty token received".to_string()));
        }
        debug!("Token for {} expires at {:?}", address, envelope.data.expires_at);

        Ok(envelope.data.token)
    }
}

#[async_trait]
impl OrderService for OrderClient {
    async fn sign_in(&self, wallet: &Wallet) -> VoterResult<String> {
        let address = wallet.checksum_address();
        let message = self.sign_in_message(&address).await?;
        let signature = wallet.sign_message(&message).await?;
        let token = self.authenticate(&address, &message, &signature).await?;

        info!("Signed in as {}", address);
        Ok(token)
    }

    async fn create_order(
        &self,
        token: &str,
        request: &CreateOrderRequest,
    ) -> VoterResult<OrderData> {
        let response = self
            .http
            .post(self.url("/feeds/orders"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let envelope: ApiEnvelope<OrderData> =
            read_json(response, &[StatusCode::CREATED], "create order").await?;
        if envelope.data.order.id.is_empty() {
            return Err(VoterError::Api("Empty order ID received".to_string()));
        }

        Ok(envelope.data)
    }

    async fn get_order(&self, token: &str, order_id: &str) -> VoterResult<VoteOrder> {
        let response = self
            .http
            .get(self.url(&format!("/feeds/orders/{}", order_id)))
            .bearer_auth(token)
            .send()
            .await?;

        let envelope: ApiEnvelope<OrderStatus> =
            read_json(response, &[StatusCode::OK], "get order").await?;

        Ok(envelope.data.order)
    }

    async fn confirm_order(&self, token: &str, order_id: &str, tx_hash: &str) -> VoterResult<()> {
        let response = self
            .http
            .post(self.url(&format!("/feeds/orders/{}/confirm", order_id)))
            .bearer_auth(token)
            .json(&ConfirmOrderRequest { tx_hash })
            .send()
            .await?;

        let envelope: ApiEnvelope<ConfirmResult> =
            read_json(response, &[StatusCode::OK], "confirm order").await?;
        debug!(
            "Confirm order {}: success={} {}",
            order_id, envelope.data.success, envelope.data.message
        );

        Ok(())
    }
}

/// Check the status, then decode the body as JSON
async fn read_json<T: DeserializeOwned>(
    response: Response,
    expected: &[StatusCode],
    operation: &str,
) -> VoterResult<T> {
    let status = response.status();
    let body = response.text().await?;
    debug!("{} response ({}): {}", operation, status, body);

    if !expected.contains(&status) {
        return Err(VoterError::Api(format!(
            "{} failed: status {}, body: {}",
            operation, status, body
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| VoterError::Api(format!("Failed to decode {} response: {}", operation, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Json;
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response as ServerResponse};
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::{json, Value};

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn reply(status: u16, body: Value) -> ServerResponse {
        (axum::http::StatusCode::from_u16(status).unwrap(), axum::Json(body)).into_response()
    }

    fn bearer_ok(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            == Some("Bearer tok")
    }

    /// Serve `app` on an ephemeral local port and point a client at it
    async fn client_for(app: Router) -> OrderClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        OrderClient::new(&ApiConfig {
            base_url: format!("http://{}/", addr),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    fn sign_in_routes(message: &'static str, token: &'static str) -> Router {
        Router::new()
            .route(
                "/auths/wallets/sign-in/message",
                get(move || async move { reply(200, json!({ "data": { "message": message } })) }),
            )
            .route(
                "/auths/wallets/sign-in",
                post(move |Json(body): Json<Value>| async move {
                    let signed = body["signature"].as_str().map_or(false, |s| s.starts_with("0x"));
                    if !signed || body["type"] != WALLET_TYPE || body["message"] != message {
                        return reply(401, json!({ "message": "bad signature" }));
                    }
                    reply(201, json!({ "data": { "token": token } }))
                }),
            )
    }

    fn order_body(order_id: &str) -> Value {
        json!({
            "statusCode": 201,
            "data": {
                "order": { "_id": order_id, "status": "PENDING" },
                "payment": {
                    "contractAddress": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                    "params": {
                        "feedAmount": 3,
                        "requestId": "abc",
                        "requestData": "",
                        "userHashedMessage": "0x1234",
                        "integritySignature": "5678"
                    }
                }
            }
        })
    }

    fn order_request() -> CreateOrderRequest {
        CreateOrderRequest {
            candidate_id: "7".to_string(),
            chain_id: "10143".to_string(),
            country_id: "ID".to_string(),
            rpc_url: "https://rpc".to_string(),
            wallet_id: "w".to_string(),
            feed_amount: 3,
        }
    }

    fn orders_route(status: u16, order_id: &'static str) -> Router {
        Router::new().route(
            "/feeds/orders",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                if !bearer_ok(&headers) || body["candidateID"] != "7" {
                    return reply(400, json!({ "message": "bad request" }));
                }
                reply(status, order_body(order_id))
            }),
        )
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = OrderClient::new(&ApiConfig {
            base_url: "https://api.example.com/".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(
            client.url("/feeds/orders"),
            "https://api.example.com/feeds/orders"
        );
    }

    #[tokio::test]
    async fn test_sign_in_exchanges_signed_message_for_token() {
        let client = client_for(sign_in_routes("Sign in\nNonce: 1", "tok")).await;
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();

        assert_eq!(client.sign_in(&wallet).await.unwrap(), "tok");
    }

    #[tokio::test]
    async fn test_empty_sign_in_message_is_rejected() {
        let client = client_for(sign_in_routes("", "tok")).await;
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();

        let err = client.sign_in(&wallet).await.unwrap_err();
        assert!(matches!(&err, VoterError::Api(m) if m.contains("sign-in message")));
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let client = client_for(sign_in_routes("Sign in", "")).await;
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();

        let err = client.sign_in(&wallet).await.unwrap_err();
        assert!(matches!(&err, VoterError::Api(m) if m.contains("Empty token")));
    }

    #[tokio::test]
    async fn test_create_order_returns_payment() {
        let client = client_for(orders_route(201, "65f0c0ffee")).await;

        let order = client.create_order("tok", &order_request()).await.unwrap();
        assert_eq!(order.order.id, "65f0c0ffee");
        assert_eq!(order.payment.params.request_id, "abc");
        assert_eq!(order.payment.chain_id, None);
    }

    #[tokio::test]
    async fn test_create_order_requires_created_status() {
        let client = client_for(orders_route(200, "65f0c0ffee")).await;

        let err = client.create_order("tok", &order_request()).await.unwrap_err();
        match err {
            VoterError::Api(message) => {
                assert!(message.contains("create order failed"));
                assert!(message.contains("200"));
                assert!(message.contains("65f0c0ffee"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_order_rejects_empty_order_id() {
        let client = client_for(orders_route(201, "")).await;

        let err = client.create_order("tok", &order_request()).await.unwrap_err();
        assert!(matches!(&err, VoterError::Api(m) if m.contains("Empty order ID")));
    }

    #[tokio::test]
    async fn test_get_order_reads_status() {
        let app = Router::new().route(
            "/feeds/orders/:id",
            get(|headers: HeaderMap| async move {
                if !bearer_ok(&headers) {
                    return reply(401, json!({}));
                }
                reply(200, json!({ "data": { "order": { "_id": "o-1", "status": "PROCESSING" } } }))
            }),
        );
        let client = client_for(app).await;

        let order = client.get_order("tok", "o-1").await.unwrap();
        assert_eq!(order.id, "o-1");
        assert_eq!(order.status, "PROCESSING");
    }

    #[tokio::test]
    async fn test_confirm_order_posts_hash() {
        let app = Router::new().route(
            "/feeds/orders/o-1/confirm",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if !bearer_ok(&headers) || body["txHash"] != "0xabc" {
                    return reply(400, json!({}));
                }
                reply(200, json!({ "data": { "success": true, "message": "ok" } }))
            }),
        );
        let client = client_for(app).await;

        client.confirm_order("tok", "o-1", "0xabc").await.unwrap();
    }

    #[tokio::test]
    async fn test_confirm_order_surfaces_status_and_body() {
        let app = Router::new().route(
            "/feeds/orders/o-1/confirm",
            post(|| async { reply(500, json!({ "message": "database down" })) }),
        );
        let client = client_for(app).await;

        let err = client.confirm_order("tok", "o-1", "0xabc").await.unwrap_err();
        match err {
            VoterError::Api(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("database down"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
