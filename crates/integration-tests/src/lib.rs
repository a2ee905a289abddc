//! End-to-end tests for the cartsync client.
//!
//! The tests drive the real [`cartsync_client::Storefront`] (HTTP client plus
//! file-backed session storage) against [`MockStore`], an in-process axum
//! server speaking the storefront's REST dialect: Spanish field names, money
//! as JSON floats, errors as `{"detail": ...}`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! No external services are needed; each test starts its own server on an
//! ephemeral port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::json;

use cartsync_client::Storefront;
use cartsync_client::config::ClientConfig;

const TAX_RATE: Decimal = Decimal::from_parts(21, 0, 0, false, 2);
const FREE_SHIPPING_ABOVE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
const FLAT_SHIPPING: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct Account {
    id: i64,
    nombre: String,
    email: String,
    contrasena: String,
}

#[derive(Debug, Clone)]
struct Product {
    nombre: String,
    precio: Decimal,
    stock: u32,
    imagen: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OrderItem {
    producto_id: i64,
    nombre: String,
    cantidad: u32,
    #[serde(with = "rust_decimal::serde::float")]
    precio_unitario: Decimal,
}

#[derive(Debug, Clone)]
struct Order {
    id: i64,
    usuario_id: i64,
    fecha: NaiveDateTime,
    direccion: String,
    tarjeta: String,
    items: Vec<OrderItem>,
    envio: Decimal,
    total: Decimal,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: Vec<Account>,
    tokens: HashMap<String, i64>,
    products: HashMap<i64, Product>,
    /// Cart lines per user, in insertion order.
    carts: HashMap<i64, Vec<(i64, u32)>>,
    orders: Vec<Order>,
    next_token: u64,
    total_adjustment: Decimal,
    requests: Vec<String>,
}

impl MockState {
    fn cart_mut(&mut self, user_id: i64) -> &mut Vec<(i64, u32)> {
        self.carts.entry(user_id).or_default()
    }
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Server handle
// =============================================================================

/// A running mock storefront API.
///
/// The server task lives for the rest of the test's runtime.
#[derive(Clone)]
pub struct MockStore {
    state: Shared,
    addr: SocketAddr,
}

impl MockStore {
    /// Bind to an ephemeral localhost port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let state = Shared::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock store listener");
        let addr = listener.local_addr().expect("mock store address");

        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { state, addr }
    }

    /// Start with the standard fixture: one account and two products.
    ///
    /// - account `ana@example.com` / `secreto` (id 1)
    /// - product 1 "Mochila" at 100.00, stock 5
    /// - product 2 "Gorra" at 15.50, stock 10
    pub async fn seeded() -> Self {
        let store = Self::start().await;
        store.add_account("Ana", "ana@example.com", "secreto");
        store.add_product(1, "Mochila", Decimal::new(100, 0), 5);
        store.add_product(2, "Gorra", Decimal::new(1550, 2), 10);
        store
    }

    /// Base URL to point the client at.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// A storefront wired to this server, persisting its session in `state_dir`.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn storefront(&self, state_dir: &Path) -> Storefront {
        let config =
            ClientConfig::for_api_url(&self.base_url(), state_dir).expect("mock store config");
        Storefront::from_config(&config).expect("storefront over mock store")
    }

    /// Register an account directly. Returns its id.
    pub fn add_account(&self, nombre: &str, email: &str, contrasena: &str) -> i64 {
        let mut state = lock(&self.state);
        let id = i64::try_from(state.accounts.len()).unwrap_or(i64::MAX - 1) + 1;
        state.accounts.push(Account {
            id,
            nombre: nombre.to_string(),
            email: email.to_string(),
            contrasena: contrasena.to_string(),
        });
        id
    }

    pub fn add_product(&self, id: i64, nombre: &str, precio: Decimal, stock: u32) {
        lock(&self.state).products.insert(
            id,
            Product {
                nombre: nombre.to_string(),
                precio,
                stock,
                imagen: Some(format!("/static/productos/{id}.jpg")),
            },
        );
    }

    pub fn set_stock(&self, id: i64, stock: u32) {
        if let Some(product) = lock(&self.state).products.get_mut(&id) {
            product.stock = stock;
        }
    }

    #[must_use]
    pub fn stock(&self, id: i64) -> Option<u32> {
        lock(&self.state).products.get(&id).map(|p| p.stock)
    }

    /// Added to every finalized total, to simulate server-side pricing that
    /// differs from the client estimate.
    pub fn set_total_adjustment(&self, amount: Decimal) {
        lock(&self.state).total_adjustment = amount;
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        lock(&self.state).tokens.clear();
    }

    /// Server-side cart of the account with `email`, as `(product, quantity)`.
    #[must_use]
    pub fn cart_of(&self, email: &str) -> Vec<(i64, u32)> {
        let state = lock(&self.state);
        state
            .accounts
            .iter()
            .find(|a| a.email == email)
            .and_then(|a| state.carts.get(&a.id))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }

    /// Requests served so far, as `"METHOD path"`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }

    pub fn clear_requests(&self) {
        lock(&self.state).requests.clear();
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Shared) -> Router {
    Router::new()
        .route("/iniciar-sesion", post(login))
        .route("/registrar", post(register))
        .route("/carrito", get(get_cart).post(upsert_line))
        .route("/carrito/{producto_id}", delete(delete_line))
        .route("/carrito/cancelar", post(clear_cart))
        .route("/carrito/finalizar", post(finalize))
        .route("/compras", get(list_orders))
        .route("/compras/{compra_id}", get(get_order))
        .with_state(state)
}

type Reply = Result<Response, Response>;

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn record(state: &mut MockState, what: String) {
    state.requests.push(what);
}

/// Resolve the bearer token to a user id.
fn authorize(state: &MockState, headers: &HeaderMap) -> Result<i64, Response> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.tokens.get(token).copied())
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "No autenticado"))
}

fn money(amount: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    amount.to_f64().unwrap_or_default()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    contrasena: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginBody>) -> Reply {
    let mut state = lock(&state);
    record(&mut state, "POST /iniciar-sesion".to_string());

    let account = state
        .accounts
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(&body.email) && a.contrasena == body.contrasena)
        .cloned()
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Credenciales inválidas"))?;

    state.next_token += 1;
    let token = format!("tok-{}-{}", state.next_token, account.id);
    state.tokens.insert(token.clone(), account.id);

    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
        "user": {
            "id": account.id,
            "nombre": account.nombre,
            "email": account.email,
        },
    }))
    .into_response())
}

#[derive(Deserialize)]
struct RegisterBody {
    nombre: String,
    email: String,
    contrasena: String,
}

async fn register(State(state): State<Shared>, Json(body): Json<RegisterBody>) -> Reply {
    let mut state = lock(&state);
    record(&mut state, "POST /registrar".to_string());

    if body.contrasena.len() < 4 {
        return Err(detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            "La contraseña debe tener al menos 4 caracteres",
        ));
    }
    if state
        .accounts
        .iter()
        .any(|a| a.email.eq_ignore_ascii_case(&body.email))
    {
        return Err(detail(StatusCode::BAD_REQUEST, "El email ya está registrado"));
    }

    let id = i64::try_from(state.accounts.len()).unwrap_or(i64::MAX - 1) + 1;
    state.accounts.push(Account {
        id,
        nombre: body.nombre,
        email: body.email,
        contrasena: body.contrasena,
    });
    Ok((
        StatusCode::CREATED,
        Json(json!({ "mensaje": "Usuario registrado exitosamente" })),
    )
        .into_response())
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = lock(&state);
    record(&mut state, "GET /carrito".to_string());
    let user_id = authorize(&state, &headers)?;

    let lines = state.carts.get(&user_id).cloned().unwrap_or_default();
    let mut total = Decimal::ZERO;
    let productos: Vec<_> = lines
        .iter()
        .filter_map(|(pid, cantidad)| {
            let product = state.products.get(pid)?;
            total += product.precio * Decimal::from(*cantidad);
            Some(json!({
                "producto_id": pid,
                "nombre": product.nombre,
                "precio": money(product.precio),
                "cantidad": cantidad,
                "imagen": product.imagen,
            }))
        })
        .collect();

    Ok(Json(json!({ "productos": productos, "total": money(total) })).into_response())
}

#[derive(Deserialize)]
struct UpsertBody {
    producto_id: i64,
    cantidad: i64,
}

async fn upsert_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<UpsertBody>,
) -> Reply {
    let mut state = lock(&state);
    record(
        &mut state,
        format!("POST /carrito {} x{}", body.producto_id, body.cantidad),
    );
    let user_id = authorize(&state, &headers)?;

    let cantidad = u32::try_from(body.cantidad)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| detail(StatusCode::UNPROCESSABLE_ENTITY, "Cantidad inválida"))?;
    let stock = state
        .products
        .get(&body.producto_id)
        .map(|p| p.stock)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Producto no encontrado"))?;

    let cart = state.cart_mut(user_id);
    let current = cart
        .iter()
        .find(|(pid, _)| *pid == body.producto_id)
        .map_or(0, |(_, q)| *q);
    if current + cantidad > stock {
        return Err(detail(StatusCode::BAD_REQUEST, "No hay stock suficiente"));
    }

    match cart.iter_mut().find(|(pid, _)| *pid == body.producto_id) {
        Some((_, q)) => *q += cantidad,
        None => cart.push((body.producto_id, cantidad)),
    }
    Ok(Json(json!({ "mensaje": "Producto agregado al carrito" })).into_response())
}

async fn delete_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(producto_id): UrlPath<i64>,
) -> Reply {
    let mut state = lock(&state);
    record(&mut state, format!("DELETE /carrito/{producto_id}"));
    let user_id = authorize(&state, &headers)?;

    let cart = state.cart_mut(user_id);
    let before = cart.len();
    cart.retain(|(pid, _)| *pid != producto_id);
    if cart.len() == before {
        return Err(detail(
            StatusCode::NOT_FOUND,
            "Producto no encontrado en el carrito",
        ));
    }
    Ok(Json(json!({ "mensaje": "Producto eliminado del carrito" })).into_response())
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = lock(&state);
    record(&mut state, "POST /carrito/cancelar".to_string());
    let user_id = authorize(&state, &headers)?;

    state.cart_mut(user_id).clear();
    Ok(Json(json!({ "mensaje": "Carrito cancelado" })).into_response())
}

#[derive(Deserialize)]
struct FinalizeBody {
    direccion: String,
    tarjeta: String,
}

async fn finalize(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<FinalizeBody>,
) -> Reply {
    let mut state = lock(&state);
    record(&mut state, "POST /carrito/finalizar".to_string());
    let user_id = authorize(&state, &headers)?;

    if body.direccion.trim().is_empty() || body.tarjeta.trim().is_empty() {
        return Err(detail(
            StatusCode::BAD_REQUEST,
            "Dirección y tarjeta son obligatorias",
        ));
    }

    let lines = state.carts.get(&user_id).cloned().unwrap_or_default();
    if lines.is_empty() {
        return Err(detail(StatusCode::BAD_REQUEST, "El carrito está vacío"));
    }

    let mut items = Vec::with_capacity(lines.len());
    for (pid, cantidad) in &lines {
        let product = state
            .products
            .get(pid)
            .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Producto no encontrado"))?;
        if *cantidad > product.stock {
            return Err(detail(
                StatusCode::BAD_REQUEST,
                &format!("No hay stock suficiente de {}", product.nombre),
            ));
        }
        items.push(OrderItem {
            producto_id: *pid,
            nombre: product.nombre.clone(),
            cantidad: *cantidad,
            precio_unitario: product.precio,
        });
    }

    let subtotal: Decimal = items
        .iter()
        .map(|i| i.precio_unitario * Decimal::from(i.cantidad))
        .sum();
    let iva = (subtotal * TAX_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let envio = if subtotal > FREE_SHIPPING_ABOVE {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING
    };
    let total = subtotal + iva + envio + state.total_adjustment;

    for item in &items {
        if let Some(product) = state.products.get_mut(&item.producto_id) {
            product.stock -= item.cantidad;
        }
    }

    let id = i64::try_from(state.orders.len()).unwrap_or(i64::MAX - 1) + 1;
    state.orders.push(Order {
        id,
        usuario_id: user_id,
        fecha: chrono::Local::now().naive_local(),
        direccion: body.direccion,
        tarjeta: body.tarjeta,
        items,
        envio,
        total,
    });
    state.cart_mut(user_id).clear();

    Ok(Json(json!({
        "mensaje": "Compra finalizada",
        "compra_id": id,
        "total_final": money(total),
    }))
    .into_response())
}

fn order_json(order: &Order) -> serde_json::Value {
    json!({
        "id": order.id,
        "usuario_id": order.usuario_id,
        "fecha": order.fecha.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        "direccion": order.direccion,
        "tarjeta": order.tarjeta,
        "total": money(order.total),
        "envio": money(order.envio),
        "items": order.items,
    })
}

async fn list_orders(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut state = lock(&state);
    record(&mut state, "GET /compras".to_string());
    let user_id = authorize(&state, &headers)?;

    let orders: Vec<_> = state
        .orders
        .iter()
        .filter(|o| o.usuario_id == user_id)
        .rev()
        .map(order_json)
        .collect();
    Ok(Json(orders).into_response())
}

async fn get_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(compra_id): UrlPath<i64>,
) -> Reply {
    let mut state = lock(&state);
    record(&mut state, format!("GET /compras/{compra_id}"));
    let user_id = authorize(&state, &headers)?;

    state
        .orders
        .iter()
        .find(|o| o.id == compra_id && o.usuario_id == user_id)
        .map(|o| Json(order_json(o)).into_response())
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Compra no encontrada"))
}
