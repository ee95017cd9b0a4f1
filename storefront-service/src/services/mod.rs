pub mod checkout;
pub mod gateways;
pub mod metrics;
pub mod orders;
pub mod reconciliation;
pub mod store;

pub use checkout::CheckoutService;
pub use gateways::{GatewayRegistry, PaymentGateway};
pub use metrics::{get_metrics, init_metrics};
pub use orders::OrderService;
pub use reconciliation::OrderReconciler;
pub use store::{MemoryStore, PgStore, Store};
