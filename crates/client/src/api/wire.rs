//! JSON shapes of the storefront API and their conversion to domain types.
//!
//! Field names follow the server. Conversions are total: anything the domain
//! types reject (negative prices, zero quantities, unknown timestamp formats)
//! fails deserialization and surfaces as [`ApiError::Decode`].
//!
//! [`ApiError::Decode`]: super::ApiError::Decode

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use cartsync_core::{
    CartLine, Email, FinalizedOrder, Money, OrderId, OrderLine, OrderSummary, ProductId, Quantity,
    UserId,
};

use super::{FinalizeReceipt, LoginGrant};
use crate::models::{AccessToken, Identity};

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub contrasena: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub nombre: &'a str,
    pub email: &'a str,
    pub contrasena: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpsertLineRequest {
    pub producto_id: ProductId,
    pub cantidad: Quantity,
}

#[derive(Debug, Serialize)]
pub struct FinalizeRequest<'a> {
    pub direccion: &'a str,
    pub tarjeta: &'a str,
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    access_token: String,
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    user: Option<UserResource>,
}

#[derive(Debug, Deserialize)]
struct UserResource {
    id: UserId,
    nombre: String,
    email: Email,
}

impl LoginResponse {
    pub fn into_grant(self) -> LoginGrant {
        LoginGrant {
            access_token: AccessToken::new(self.access_token),
            user_id: self.user_id.or_else(|| self.user.as_ref().map(|u| u.id)),
            user: self.user.map(|u| Identity {
                id: Some(u.id),
                display_name: u.nombre,
                email: u.email,
            }),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CartResponse {
    #[serde(alias = "items", default)]
    productos: Vec<CartLineResource>,
}

#[derive(Debug, Deserialize)]
struct CartLineResource {
    producto_id: ProductId,
    nombre: String,
    precio: Money,
    cantidad: Quantity,
    #[serde(default)]
    imagen: Option<String>,
}

impl CartResponse {
    pub fn into_lines(self) -> Vec<CartLine> {
        self.productos
            .into_iter()
            .map(|l| CartLine {
                product_id: l.producto_id,
                display_name: l.nombre,
                unit_price: l.precio,
                quantity: l.cantidad,
                image_ref: l.imagen.filter(|s| !s.trim().is_empty()),
            })
            .collect()
    }
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct FinalizeResponse {
    compra_id: OrderId,
    #[serde(alias = "total")]
    total_final: Money,
}

impl From<FinalizeResponse> for FinalizeReceipt {
    fn from(r: FinalizeResponse) -> Self {
        Self {
            order_id: r.compra_id,
            total: r.total_final,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderResource {
    id: OrderId,
    #[serde(deserialize_with = "deserialize_timestamp")]
    fecha: NaiveDateTime,
    #[serde(default)]
    direccion: String,
    #[serde(default)]
    tarjeta: String,
    total: Money,
    #[serde(default)]
    envio: Money,
    #[serde(default)]
    items: Vec<OrderLineResource>,
}

#[derive(Debug, Deserialize)]
struct OrderLineResource {
    #[serde(default)]
    producto_id: Option<ProductId>,
    nombre: String,
    cantidad: Quantity,
    #[serde(alias = "precio")]
    precio_unitario: Money,
}

impl OrderResource {
    pub fn into_order(self) -> FinalizedOrder {
        FinalizedOrder {
            id: self.id,
            placed_at: self.fecha,
            shipping_address: self.direccion,
            payment_reference: self.tarjeta,
            lines: self
                .items
                .into_iter()
                .map(|i| OrderLine {
                    product_id: i.producto_id,
                    display_name: i.nombre,
                    unit_price: i.precio_unitario,
                    quantity: i.cantidad,
                })
                .collect(),
            shipping_cost: self.envio,
            total: self.total,
        }
    }

    pub fn into_summary(self) -> OrderSummary {
        self.into_order().summary()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Extract a readable message from an error body.
///
/// Handles `{"detail": "..."}`, validation lists of the form
/// `{"detail": [{"msg": "..."}, ...]}` and any other `detail` value. Returns
/// `None` when the body is not JSON or carries no `detail`.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                .collect();
            if messages.is_empty() {
                Some(serde_json::Value::Array(items.clone()).to_string())
            } else {
                Some(messages.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Timestamps
// =============================================================================

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse an order timestamp: RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS[.f]`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{raw}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, Timelike};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_login_with_user_id_only() {
        let resp: LoginResponse =
            serde_json::from_value(json!({"access_token": "tok", "user_id": 3})).unwrap();
        let grant = resp.into_grant();
        assert_eq!(grant.access_token.expose(), "tok");
        assert_eq!(grant.user_id, Some(UserId::new(3)));
        assert!(grant.user.is_none());
    }

    #[test]
    fn test_login_with_token_only() {
        let resp: LoginResponse =
            serde_json::from_value(json!({"access_token": "tok", "token_type": "bearer"}))
                .unwrap();
        let grant = resp.into_grant();
        assert_eq!(grant.user_id, None);
        assert!(grant.user.is_none());
    }

    #[test]
    fn test_login_with_user_object() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "access_token": "tok",
            "token_type": "bearer",
            "user": {"id": 9, "nombre": "Ana Pérez", "email": "ana@example.com"}
        }))
        .unwrap();
        let grant = resp.into_grant();
        assert_eq!(grant.user_id, Some(UserId::new(9)));
        let user = grant.user.unwrap();
        assert_eq!(user.display_name, "Ana Pérez");
    }

    #[test]
    fn test_cart_accepts_productos_or_items() {
        let a: CartResponse = serde_json::from_value(json!({
            "productos": [{"producto_id": 1, "nombre": "Mochila", "precio": 100.0, "cantidad": 2}]
        }))
        .unwrap();
        let b: CartResponse = serde_json::from_value(json!({
            "items": [{"producto_id": 1, "nombre": "Mochila", "precio": "100.00", "cantidad": 2,
                       "imagen": "img/mochila.png"}],
            "subtotal": 200.0, "iva": 42.0, "envio": 0, "total": 242.0
        }))
        .unwrap();

        let a = a.into_lines();
        let b = b.into_lines();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].unit_price, b[0].unit_price);
        assert_eq!(a[0].quantity, Quantity::new(2).unwrap());
        assert!(a[0].image_ref.is_none());
        assert_eq!(b[0].image_ref.as_deref(), Some("img/mochila.png"));
    }

    #[test]
    fn test_cart_rejects_zero_quantity_and_negative_price() {
        let zero = serde_json::from_value::<CartResponse>(json!({
            "productos": [{"producto_id": 1, "nombre": "x", "precio": 1, "cantidad": 0}]
        }));
        assert!(zero.is_err());

        let negative = serde_json::from_value::<CartResponse>(json!({
            "productos": [{"producto_id": 1, "nombre": "x", "precio": -1, "cantidad": 1}]
        }));
        assert!(negative.is_err());
    }

    #[test]
    fn test_finalize_response() {
        let receipt: FinalizeReceipt = serde_json::from_value::<FinalizeResponse>(
            json!({"compra_id": 42, "total_final": 292.0}),
        )
        .unwrap()
        .into();
        assert_eq!(receipt.order_id, OrderId::new(42));
        assert_eq!(receipt.total, Money::from_units(292));
    }

    #[test]
    fn test_order_resource_without_product_ids() {
        let order: OrderResource = serde_json::from_value(json!({
            "id": 5,
            "fecha": "2025-11-03 10:30:00.123456",
            "direccion": "Calle 1",
            "tarjeta": "4242",
            "total": 292.0,
            "envio": 50.0,
            "items": [{"nombre": "Mochila", "cantidad": 2, "precio_unitario": 100.0}]
        }))
        .unwrap();
        let order = order.into_order();
        assert_eq!(order.id, OrderId::new(5));
        assert_eq!(order.lines[0].product_id, None);
        assert_eq!(order.shipping_cost, Money::from_units(50));
        assert_eq!(order.placed_at.hour(), 10);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 11, 3)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2025-11-03 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-03T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-03T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail": "No hay stock suficiente"}"#).as_deref(),
            Some("No hay stock suficiente")
        );
        assert_eq!(
            extract_detail(
                r#"{"detail": [{"loc": ["body", "email"], "msg": "value is not a valid email"}]}"#
            )
            .as_deref(),
            Some("value is not a valid email")
        );
        assert_eq!(extract_detail("<html>Bad Gateway</html>"), None);
        assert_eq!(extract_detail(r#"{"message": "x"}"#), None);
    }
}
