//! One module per command group. Each command makes exactly one store
//! call (plus a reload where the view needs fresh server state) and returns
//! the text to print.

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod session;
