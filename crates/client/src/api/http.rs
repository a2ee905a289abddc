//! `reqwest` implementation of [`StoreApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use cartsync_core::{
    CartLine, Email, FinalizedOrder, OrderId, OrderSummary, PaymentReference, ProductId, Quantity,
    ShippingAddress,
};

use super::wire::{
    CartResponse, FinalizeRequest, FinalizeResponse, LoginRequest, LoginResponse, OrderResource,
    RegisterRequest, UpsertLineRequest, extract_detail,
};
use super::{ApiError, FinalizeReceipt, LoginGrant, Registration, StoreApi};
use crate::config::ClientConfig;
use crate::models::AccessToken;

const REQUEST_ID_HEADER: &str = "X-Request-Id";

// =============================================================================
// HttpApi
// =============================================================================

/// Client for the storefront REST API.
#[derive(Clone)]
pub struct HttpApi {
    inner: Arc<HttpApiInner>,
}

struct HttpApiInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApi {
    /// Create a client for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_timeout(config.api_url.clone(), config.http_timeout)
    }

    /// Create a client for an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the underlying HTTP client cannot be built.
    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cartsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpApiInner { client, base_url }),
        })
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&AccessToken>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.inner.base_url.join(path)?;
        let request_id = Uuid::new_v4();
        debug!(%method, %url, %request_id, "Sending API request");

        let builder = self
            .inner
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id.to_string());

        Ok(match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        })
    }

    /// Send and map non-success statuses to [`ApiError`].
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body).unwrap_or_else(|| fallback_detail(status, &body));

        debug!(
            status = %status,
            detail = %detail,
            "API returned non-success status"
        );

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound(detail),
            _ => ApiError::Rejected {
                status: status.as_u16(),
                detail,
            },
        })
    }

    /// Send, then decode the JSON body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %text.chars().take(500).collect::<String>(),
                    "Failed to parse API response"
                );
                Err(ApiError::Decode(e))
            }
        }
    }
}

/// Message to show when the error body has no usable `detail`.
fn fallback_detail(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.chars().take(200).collect()
    }
}

#[async_trait]
impl StoreApi for HttpApi {
    #[instrument(skip(self, secret), fields(email = %email))]
    async fn login(&self, email: &Email, secret: &SecretString) -> Result<LoginGrant, ApiError> {
        let body = LoginRequest {
            email: email.as_str(),
            contrasena: secret.expose_secret(),
        };
        let request = self.request(Method::POST, "iniciar-sesion", None)?.json(&body);
        let response: LoginResponse = self.send_json(request).await?;
        Ok(response.into_grant())
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let body = RegisterRequest {
            nombre: &registration.name,
            email: registration.email.as_str(),
            contrasena: registration.secret.expose_secret(),
        };
        let request = self.request(Method::POST, "registrar", None)?.json(&body);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn fetch_cart(&self, token: &AccessToken) -> Result<Vec<CartLine>, ApiError> {
        let request = self.request(Method::GET, "carrito", Some(token))?;
        let response: CartResponse = self.send_json(request).await?;
        Ok(response.into_lines())
    }

    #[instrument(skip(self, token), fields(product_id = %product_id, quantity = %quantity))]
    async fn upsert_line(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let body = UpsertLineRequest {
            producto_id: product_id,
            cantidad: quantity,
        };
        let request = self
            .request(Method::POST, "carrito", Some(token))?
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn delete_line(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let path = format!("carrito/{product_id}");
        let request = self.request(Method::DELETE, &path, Some(token))?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn clear_cart(&self, token: &AccessToken) -> Result<(), ApiError> {
        let request = self.request(Method::POST, "carrito/cancelar", Some(token))?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token, address, payment))]
    async fn finalize(
        &self,
        token: &AccessToken,
        address: &ShippingAddress,
        payment: &PaymentReference,
    ) -> Result<FinalizeReceipt, ApiError> {
        let body = FinalizeRequest {
            direccion: address.as_str(),
            tarjeta: payment.as_str(),
        };
        let request = self
            .request(Method::POST, "carrito/finalizar", Some(token))?
            .json(&body);
        let response: FinalizeResponse = self.send_json(request).await?;
        Ok(response.into())
    }

    #[instrument(skip(self, token))]
    async fn list_orders(&self, token: &AccessToken) -> Result<Vec<OrderSummary>, ApiError> {
        let request = self.request(Method::GET, "compras", Some(token))?;
        let orders: Vec<OrderResource> = self.send_json(request).await?;
        Ok(orders.into_iter().map(OrderResource::into_summary).collect())
    }

    #[instrument(skip(self, token), fields(order_id = %order_id))]
    async fn get_order(
        &self,
        token: &AccessToken,
        order_id: OrderId,
    ) -> Result<FinalizedOrder, ApiError> {
        let path = format!("compras/{order_id}");
        let request = self.request(Method::GET, &path, Some(token))?;
        let order: OrderResource = self.send_json(request).await?;
        Ok(order.into_order())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn api() -> HttpApi {
        HttpApi::with_timeout(
            Url::parse("http://localhost:8000/api/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_request_joins_under_base_path() {
        let request = api()
            .request(Method::DELETE, "carrito/12", None)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8000/api/carrito/12");
        assert!(request.headers().contains_key(REQUEST_ID_HEADER));
        assert!(!request.headers().contains_key(reqwest::header::AUTHORIZATION));
    }

    #[test]
    fn test_request_sets_bearer_token() {
        let token = AccessToken::new("abc");
        let request = api()
            .request(Method::GET, "carrito", Some(&token))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers()[reqwest::header::AUTHORIZATION],
            "Bearer abc"
        );
    }

    #[test]
    fn test_fallback_detail() {
        assert_eq!(fallback_detail(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
        assert_eq!(
            fallback_detail(StatusCode::BAD_REQUEST, " plain text "),
            "plain text"
        );
    }
}
