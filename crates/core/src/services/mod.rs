//! Feature services: thin orchestration over the store gateway.
//!
//! Business rules (cascade guards, stock control, credit limits) live here,
//! never in the adapter; the adapter only decides where an operation lands.

mod cash_sessions;
mod customers;
mod products;
mod sales;
mod settings;

pub use cash_sessions::CashSessionsService;
pub use customers::{CustomersService, NewCustomer};
pub use products::{NewProduct, ProductsService};
pub use sales::{CartLine, CheckoutRequest, CompletedSale, SalesService};
pub use settings::SettingsService;
