//! Domain models for the storefront.

pub mod cart;
pub mod order;
pub mod payment;
pub mod product;

pub use cart::CartItem;
pub use order::{Order, OrderItem, OrderStatus, StatusChange};
pub use payment::{
    CallbackOutcome, CallbackRequest, PaymentCallback, PaymentContext, PaymentDirective,
    PaymentMethod,
};
pub use product::{NewProduct, Product, ProductFilter, ProductPatch};
