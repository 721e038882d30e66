//! External collaborators and in-memory implementations.

pub mod inventory;
pub mod payment;
pub mod shipping;
pub mod snap;

pub use inventory::InventoryLedger;
pub use payment::{
    Callbacks, CustomerDetails, GatewayAddress, GatewayError, InMemoryPaymentGateway, ItemDetail,
    PaymentGateway, PaymentSession, SessionRequest, TransactionDetails,
};
pub use shipping::{
    CourierOption, DeliveryWindow, Destination, HttpRateSource, InMemoryRateSource, Origin,
    RateLookupError, RateQuery, RateQuote, RateSource, StaticRateTable,
};
pub use snap::SnapGateway;
