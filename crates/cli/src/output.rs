//! Plain-text rendering of store state.
//!
//! Every function returns a `String` so commands stay testable; only
//! `main` writes to the terminal.

use cartsync_client::models::Identity;
use cartsync_client::services::{CartSnapshot, Confirmation};
use cartsync_core::{FinalizedOrder, Money, MoneyError, OrderSummary, TotalsEstimate};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn identity(identity: &Identity) -> String {
    match identity.id {
        Some(id) => format!("{} <{}> (account #{id})", identity.display_name, identity.email),
        None => format!("{} <{}>", identity.display_name, identity.email),
    }
}

pub fn cart(snapshot: &CartSnapshot) -> String {
    if snapshot.cart.is_empty() {
        return "Your cart is empty.".to_string();
    }

    let mut lines: Vec<String> = snapshot
        .cart
        .lines()
        .iter()
        .map(|line| {
            format!(
                "  [{:>4}] {:<28} {:>3} x {:>10}  {:>10}",
                line.product_id,
                truncate(&line.display_name, 28),
                line.quantity,
                line.unit_price.to_string(),
                amount(line.line_total()),
            )
        })
        .collect();
    lines.push(String::new());
    lines.extend(totals(&snapshot.totals));
    lines.join("\n")
}

fn totals(totals: &TotalsEstimate) -> Vec<String> {
    let shipping = if totals.shipping_estimate.is_zero() {
        "free".to_string()
    } else {
        totals.shipping_estimate.to_string()
    };
    vec![
        format!("  {:<24}{:>12}", "Subtotal", totals.subtotal.to_string()),
        format!("  {:<24}{:>12}", "Tax (est.)", totals.tax_estimate.to_string()),
        format!("  {:<24}{shipping:>12}", "Shipping (est.)"),
        format!("  {:<24}{:>12}", "Total (est.)", totals.total.to_string()),
    ]
}

pub fn confirmation(confirmation: &Confirmation) -> String {
    let mut lines = vec![
        format!("Order #{} confirmed.", confirmation.order_id),
        format!("Charged: {}", confirmation.authoritative_total),
    ];
    let drift = confirmation.estimate_discrepancy();
    if !drift.is_zero() {
        lines.push(format!(
            "(The estimate shown before checkout was {}; the store's total differs by {drift:+.2}.)",
            confirmation.estimate.total
        ));
    }
    lines.join("\n")
}

pub fn order_list(orders: &[OrderSummary]) -> String {
    if orders.is_empty() {
        return "You have no orders yet.".to_string();
    }
    orders
        .iter()
        .map(|o| {
            let items = if o.item_count == 0 {
                String::new()
            } else {
                format!("  {} item(s)", o.item_count)
            };
            format!(
                "  #{:<6} {}  {:>10}{items}",
                o.id,
                o.placed_at.format(DATE_FORMAT),
                o.total.to_string()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn order(order: &FinalizedOrder) -> String {
    let mut lines = vec![
        format!("Order #{}  placed {}", order.id, order.placed_at.format(DATE_FORMAT)),
        format!("Ship to: {}", order.shipping_address),
        format!("Card:    **** {}", order.payment_reference),
        String::new(),
    ];
    lines.extend(order.lines.iter().map(|line| {
        format!(
            "  {:<28} {:>3} x {:>10}  {:>10}",
            truncate(&line.display_name, 28),
            line.quantity,
            line.unit_price.to_string(),
            amount(line.line_total()),
        )
    }));
    lines.push(String::new());
    lines.push(format!("  {:<24}{:>12}", "Shipping", order.shipping_cost.to_string()));
    lines.push(format!("  {:<24}{:>12}", "Total", order.total.to_string()));
    lines.join("\n")
}

fn amount(result: Result<Money, MoneyError>) -> String {
    result.map_or_else(|_| "out of range".to_string(), |m| m.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
