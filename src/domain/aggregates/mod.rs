//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::Product;
pub use order::{
    LineItemSnapshot, NewOrder, Order, OrderError, OrderStatus, PaymentMethod, ProductSnapshot, ShippingAddress,
    Transition, TransitionPlan,
};
pub use cart::{Cart, CartError, CartItem};
