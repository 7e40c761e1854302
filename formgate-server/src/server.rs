//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router. The API is mounted under
/// `/{namespace}/v1`; the namespace is fixed for the lifetime of the router.
pub fn build_router(state: AppState, namespace: &str) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest(&format!("/{namespace}/v1"), api::router())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Services;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use formgate_core::config::{
        CacheConfig, FormConfig, NonceConfig, PaymentConfig, RuntimeConfig, ServerConfig,
    };
    use formgate_core::gateway::{GatewayError, PaymentGateway};
    use formgate_core::nonce::NonceService;
    use formgate_sdk::objects::{
        PaymentInitiated, PaymentMethod, TransactionRequest, TransactionResponse,
    };
    use formgate_sdk::params::{ParamValue, parse_query};
    use formgate_sdk::signature::{self, SIGNATURE_PARAM};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;
    use url::Url;

    const SALT: &str = "s3cret";
    const NONCE_SECRET: &[u8] = b"nonce-secret";

    #[derive(Default)]
    struct FakeGateway {
        requests: Mutex<Vec<TransactionRequest>>,
        method_calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn start_transaction(
            &self,
            request: &TransactionRequest,
        ) -> Result<TransactionResponse, GatewayError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(TransactionResponse {
                transaction_key: "TX-42".into(),
                redirect_url: Url::parse("https://checkout.gateway.example/TX-42").unwrap(),
            })
        }

        async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, GatewayError> {
            self.method_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![PaymentMethod {
                id: "ideal".into(),
                name: "iDEAL".into(),
            }])
        }
    }

    fn config(with_payment: bool) -> RuntimeConfig {
        RuntimeConfig {
            server: ServerConfig {
                listen: "127.0.0.1:0".parse().unwrap(),
                namespace: "formgate".into(),
                home_url: Url::parse("https://forms.example.com/").unwrap(),
                allowed_redirect_origins: vec!["https://shop.example.com".into()],
            },
            nonce: NonceConfig {
                secret: NONCE_SECRET.to_vec().into_boxed_slice(),
                lifetime_secs: 3600,
            },
            captcha: None,
            payment: with_payment.then(|| PaymentConfig {
                gateway_url: Url::parse("https://gateway.example/api/").unwrap(),
                gateway_secret: b"gw".to_vec().into_boxed_slice(),
                salt: SALT.into(),
                currency: "EUR".into(),
                require_authorization: true,
                nonce: false,
                captcha: false,
            }),
            cache: CacheConfig {
                ttl_secs: 300,
                capacity: 16,
            },
            forms: vec![FormConfig {
                slug: "contact".into(),
                forward_url: Url::parse("http://127.0.0.1:9/hook").unwrap(),
                integration: Some("crm".into()),
                nonce: true,
                captcha: false,
                required_params: vec![],
                required_post_params: vec!["email".into()],
            }],
            integrations: vec![],
        }
    }

    fn app(with_payment: bool) -> (Router, Arc<FakeGateway>) {
        let gateway = Arc::new(FakeGateway::default());
        let services = Services::with_gateway(
            config(with_payment),
            Some(gateway.clone() as Arc<dyn PaymentGateway>),
        )
        .unwrap();
        (build_router(AppState::new(services), "formgate"), gateway)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, location, body)
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app(false);
        let (status, _, body) = send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_nonce_issue() {
        let (router, _) = app(false);
        let (status, _, body) = send(
            &router,
            Request::get("/formgate/v1/nonce?form_id=contact-1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["form_id"], "contact-1");
        assert_eq!(body["expires_in"], 3600);
        assert_eq!(
            body["nonce"].as_str().unwrap(),
            NonceService::new(NONCE_SECRET, 3600).issue("contact-1")
        );

        let (status, _, body) = send(
            &router,
            Request::get("/formgate/v1/nonce").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["reason"], "invalid_request");
    }

    #[tokio::test]
    async fn test_unknown_form_is_not_found() {
        let (router, _) = app(false);
        let (status, _, body) = send(&router, form_post("/formgate/v1/forms/nope", "a=b")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "rest_not_found");
    }

    #[tokio::test]
    async fn test_form_without_integration_is_rejected() {
        let (router, _) = app(false);
        let (status, _, body) =
            send(&router, form_post("/formgate/v1/forms/contact", "email=a%40b.c")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "rest_bad_request");
        assert_eq!(body["data"]["reason"], "integration_not_configured");
        assert_eq!(body["data"]["integration"], "crm");
    }

    #[tokio::test]
    async fn test_payment_requires_integration() {
        let (router, gateway) = app(false);
        let (status, _, body) = send(&router, form_post("/formgate/v1/payment", "amount=10")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["reason"], "integration_not_configured");
        assert!(gateway.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_missing_amount() {
        let (router, _) = app(true);
        let (status, _, body) = send(&router, form_post("/formgate/v1/payment", "invoice=INV-1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["data"]["reason"], "missing_post_params");
        assert_eq!(body["data"]["missing-keys"], json!(["amount"]));
    }

    #[tokio::test]
    async fn test_payment_round_trip() {
        let (router, gateway) = app(true);
        let (status, _, body) = send(
            &router,
            form_post(
                "/formgate/v1/payment",
                "amount=10.00&invoice=INV-1&redirect-url=https%3A%2F%2Fshop.example.com%2Fthanks",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let initiated: PaymentInitiated = serde_json::from_value(body).unwrap();
        assert_eq!(initiated.transaction_key, "TX-42");

        let success = gateway.requests.lock().unwrap()[0].return_urls.success.clone();
        assert_eq!(success.path(), "/formgate/v1/payment/response");

        // The gateway calls back on the signed success URL.
        let callback = format!("{}?{}", success.path(), success.query().unwrap());
        let (status, location, _) =
            send(&router, form_post(&callback, "BRQ_STATUSCODE=190&BRQ_INVOICENUMBER=INV-1")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("https://shop.example.com/thanks"));
    }

    #[tokio::test]
    async fn test_tampered_callback_is_rejected() {
        let (router, gateway) = app(true);
        send(&router, form_post("/formgate/v1/payment", "amount=10.00&invoice=INV-1")).await;
        let error_url = gateway.requests.lock().unwrap()[0].return_urls.error.clone();

        let mut query = parse_query(error_url.query().unwrap());
        query.insert("amount".into(), ParamValue::from("0.01"));
        let tampered = format!(
            "{}?{}",
            error_url.path(),
            formgate_sdk::params::to_query_string(&query).unwrap()
        );
        let (status, location, body) =
            send(&router, form_post(&tampered, "BRQ_STATUSCODE=490")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(location.is_none());
        assert_eq!(body["data"]["reason"], "unauthorized");
    }

    #[tokio::test]
    async fn test_callback_with_unknown_code_redirects_home_with_marker() {
        let (router, _) = app(true);
        let mut query = parse_query("invoice=INV-1&status=success");
        let hash = signature::generate_hash(&query, SALT.as_bytes()).unwrap();
        query.insert(SIGNATURE_PARAM.into(), ParamValue::from(hash));
        let uri = format!(
            "/formgate/v1/payment/response?{}",
            formgate_sdk::params::to_query_string(&query).unwrap()
        );
        let (status, location, _) = send(&router, form_post(&uri, "BRQ_STATUSCODE=999")).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(
            location.as_deref(),
            Some("https://forms.example.com/?formgate-error=invalid-gateway-response")
        );
    }

    #[tokio::test]
    async fn test_payment_methods_are_cached() {
        let (router, gateway) = app(true);
        for uri in [
            "/formgate/v1/payment/methods",
            "/formgate/v1/payment/methods?x=1",
            "/formgate/v1/payment/methods?x=2&lang=nl",
        ] {
            let (status, _, body) = send(&router, Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!([{"id": "ideal", "name": "iDEAL"}]));
        }
        assert_eq!(gateway.method_calls.load(Ordering::SeqCst), 1);
    }
}
