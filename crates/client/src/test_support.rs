//! In-memory `StoreApi` for unit tests.
//!
//! Behaves like the real server closely enough for the stores: additive
//! upserts with a stock check, 404 on unknown products and lines, a
//! finalize that empties the cart and records an order. Every call is
//! recorded so tests can assert that no request was made.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};

use cartsync_core::{
    CartLine, Email, FinalizedOrder, Money, OrderId, OrderLine, OrderSummary, PaymentReference,
    ProductId, Quantity, ShippingAddress, UserId, compute_totals,
};

use crate::api::{ApiError, FinalizeReceipt, LoginGrant, Registration, StoreApi};
use crate::models::AccessToken;

/// A failure to inject into the next call of an operation.
#[derive(Debug, Clone)]
pub enum FakeFailure {
    Unauthorized,
    NotFound(String),
    Rejected(u16, String),
}

impl FakeFailure {
    fn into_error(self) -> ApiError {
        match self {
            Self::Unauthorized => ApiError::Unauthorized,
            Self::NotFound(detail) => ApiError::NotFound(detail),
            Self::Rejected(status, detail) => ApiError::Rejected { status, detail },
        }
    }
}

#[derive(Debug, Clone)]
struct Product {
    name: String,
    price: Money,
    stock: u32,
}

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    password: String,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    accounts: HashMap<String, Account>,
    tokens: HashSet<String>,
    catalog: HashMap<ProductId, Product>,
    cart: Vec<(ProductId, u32)>,
    orders: Vec<FinalizedOrder>,
    next_order_id: i64,
    next_token: u32,
    total_override: Option<Money>,
    failures: HashMap<&'static str, VecDeque<FakeFailure>>,
}

pub struct FakeApi {
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_order_id: 1,
                ..FakeState::default()
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fake with one account (`ana@example.com` / `secret`) and two products:
    /// 1 = Mochila at 100 (stock 5), 2 = Gorra at 15.50 (stock 10).
    pub fn seeded() -> Self {
        let api = Self::new();
        api.add_account("ana@example.com", "secret", 7);
        api.add_product(1, "Mochila", Money::from_units(100), 5);
        api.add_product(2, "Gorra", Money::from_cents(1550), 10);
        api
    }

    pub fn add_account(&self, email: &str, password: &str, id: i64) {
        self.state().accounts.insert(
            email.to_string(),
            Account {
                id: UserId::new(id),
                password: password.to_string(),
            },
        );
    }

    pub fn add_product(&self, id: i64, name: &str, price: Money, stock: u32) {
        self.state().catalog.insert(
            ProductId::new(id),
            Product {
                name: name.to_string(),
                price,
                stock,
            },
        );
    }

    pub fn set_stock(&self, id: i64, stock: u32) {
        if let Some(p) = self.state().catalog.get_mut(&ProductId::new(id)) {
            p.stock = stock;
        }
    }

    /// Put lines straight into the server-side cart.
    pub fn seed_cart(&self, lines: &[(i64, u32)]) {
        self.state().cart = lines
            .iter()
            .map(|(id, qty)| (ProductId::new(*id), *qty))
            .collect();
    }

    /// Accept `token` as a valid bearer token.
    pub fn issue_token(&self, token: &str) {
        self.state().tokens.insert(token.to_string());
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        self.state().tokens.clear();
    }

    pub fn set_next_order_id(&self, id: i64) {
        self.state().next_order_id = id;
    }

    /// Make finalize report this total instead of its own computation.
    pub fn set_total_override(&self, total: Money) {
        self.state().total_override = Some(total);
    }

    /// Fail the next call of `op` with `failure`.
    pub fn fail_next(&self, op: &'static str, failure: FakeFailure) {
        self.state()
            .failures
            .entry(op)
            .or_default()
            .push_back(failure);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Highest number of requests that were ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn server_cart(&self) -> Vec<(i64, u32)> {
        self.state()
            .cart
            .iter()
            .map(|(id, qty)| (id.as_i64(), *qty))
            .collect()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Record the call, let other tasks run, then apply any injected failure.
    async fn begin(&self, op: &'static str, detail: String) -> Result<(), ApiError> {
        {
            let mut state = self.state();
            state.calls.push(if detail.is_empty() {
                op.to_string()
            } else {
                format!("{op} {detail}")
            });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = self
            .state()
            .failures
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        failure.map_or(Ok(()), |f| Err(f.into_error()))
    }

    fn check_token(&self, token: &AccessToken) -> Result<(), ApiError> {
        if self.state().tokens.contains(token.expose()) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }

    fn lines(state: &FakeState) -> Vec<CartLine> {
        state
            .cart
            .iter()
            .filter_map(|(id, qty)| {
                let product = state.catalog.get(id)?;
                Some(CartLine {
                    product_id: *id,
                    display_name: product.name.clone(),
                    unit_price: product.price,
                    quantity: Quantity::new(i64::from(*qty)).ok()?,
                    image_ref: None,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StoreApi for FakeApi {
    async fn login(&self, email: &Email, secret: &SecretString) -> Result<LoginGrant, ApiError> {
        self.begin("login", email.to_string()).await?;
        let mut state = self.state();
        let account = state
            .accounts
            .get(email.as_str())
            .filter(|a| a.password == secret.expose_secret())
            .cloned()
            .ok_or(ApiError::Unauthorized)?;

        state.next_token += 1;
        let token = format!("token-{}", state.next_token);
        state.tokens.insert(token.clone());

        Ok(LoginGrant {
            access_token: AccessToken::new(token),
            user_id: Some(account.id),
            user: None,
        })
    }

    async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        self.begin("register", registration.email.to_string()).await?;
        let mut state = self.state();
        if state.accounts.contains_key(registration.email.as_str()) {
            return Err(ApiError::Rejected {
                status: 400,
                detail: "El email ya está registrado.".to_string(),
            });
        }
        let id = i64::try_from(state.accounts.len()).unwrap() + 100;
        state.accounts.insert(
            registration.email.to_string(),
            Account {
                id: UserId::new(id),
                password: registration.secret.expose_secret().to_string(),
            },
        );
        Ok(())
    }

    async fn fetch_cart(&self, token: &AccessToken) -> Result<Vec<CartLine>, ApiError> {
        self.begin("fetch_cart", String::new()).await?;
        self.check_token(token)?;
        Ok(Self::lines(&self.state()))
    }

    async fn upsert_line(
        &self,
        token: &AccessToken,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        self.begin("upsert_line", format!("{product_id} x{quantity}"))
            .await?;
        self.check_token(token)?;
        let mut state = self.state();
        let stock = state
            .catalog
            .get(&product_id)
            .map(|p| p.stock)
            .ok_or_else(|| ApiError::NotFound("Producto no existe".to_string()))?;

        let current = state
            .cart
            .iter()
            .find(|(id, _)| *id == product_id)
            .map_or(0, |(_, q)| *q);
        if current + quantity.get() > stock {
            return Err(ApiError::Rejected {
                status: 400,
                detail: "No hay stock suficiente".to_string(),
            });
        }

        match state.cart.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, q)) => *q += quantity.get(),
            None => state.cart.push((product_id, quantity.get())),
        }
        Ok(())
    }

    async fn delete_line(
        &self,
        token: &AccessToken,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        self.begin("delete_line", product_id.to_string()).await?;
        self.check_token(token)?;
        let mut state = self.state();
        let before = state.cart.len();
        state.cart.retain(|(id, _)| *id != product_id);
        if state.cart.len() == before {
            return Err(ApiError::NotFound(
                "Producto no encontrado en el carrito".to_string(),
            ));
        }
        Ok(())
    }

    async fn clear_cart(&self, token: &AccessToken) -> Result<(), ApiError> {
        self.begin("clear_cart", String::new()).await?;
        self.check_token(token)?;
        self.state().cart.clear();
        Ok(())
    }

    async fn finalize(
        &self,
        token: &AccessToken,
        address: &ShippingAddress,
        payment: &PaymentReference,
    ) -> Result<FinalizeReceipt, ApiError> {
        self.begin("finalize", String::new()).await?;
        self.check_token(token)?;
        let mut state = self.state();
        let lines = Self::lines(&state);
        if lines.is_empty() {
            return Err(ApiError::Rejected {
                status: 400,
                detail: "El carrito está vacío.".to_string(),
            });
        }

        let totals = compute_totals(&lines).unwrap();
        let total = state.total_override.unwrap_or(totals.total);
        let order_id = OrderId::new(state.next_order_id);
        state.next_order_id += 1;

        state.orders.push(FinalizedOrder {
            id: order_id,
            placed_at: NaiveDate::from_ymd_opt(2025, 11, 3)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            shipping_address: address.to_string(),
            payment_reference: payment.as_str().to_string(),
            lines: lines
                .iter()
                .map(|l| OrderLine {
                    product_id: Some(l.product_id),
                    display_name: l.display_name.clone(),
                    unit_price: l.unit_price,
                    quantity: l.quantity,
                })
                .collect(),
            shipping_cost: totals.shipping_estimate,
            total,
        });
        for line in &lines {
            if let Some(p) = state.catalog.get_mut(&line.product_id) {
                p.stock -= line.quantity.get().min(p.stock);
            }
        }
        state.cart.clear();

        Ok(FinalizeReceipt { order_id, total })
    }

    async fn list_orders(&self, token: &AccessToken) -> Result<Vec<OrderSummary>, ApiError> {
        self.begin("list_orders", String::new()).await?;
        self.check_token(token)?;
        Ok(self
            .state()
            .orders
            .iter()
            .map(FinalizedOrder::summary)
            .collect())
    }

    async fn get_order(
        &self,
        token: &AccessToken,
        order_id: OrderId,
    ) -> Result<FinalizedOrder, ApiError> {
        self.begin("get_order", order_id.to_string()).await?;
        self.check_token(token)?;
        self.state()
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("Compra no encontrada".to_string()))
    }
}

/// Shorthand for test prices with cents.
pub fn money(s: &str) -> Money {
    Money::new(s.parse::<Decimal>().unwrap()).unwrap()
}
