//! Application services
pub mod carts;
pub mod checkout;
pub mod orders;
pub mod reconciliation;

pub use carts::{CartLineView, CartService, CartView};
pub use checkout::{CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, PricedCart, RedirectUrls};
pub use orders::{OrderService, Transitioned};
pub use reconciliation::{Reconciler, SessionStatusView, WebhookAck};
