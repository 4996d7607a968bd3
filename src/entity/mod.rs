pub mod addresses;
pub mod audit_logs;
pub mod cart_items;
pub mod order_items;
pub mod orders;
pub mod payment_events;
pub mod products;
pub mod reviews;
pub mod stores;
pub mod users;

pub use addresses::Entity as Addresses;
pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payment_events::Entity as PaymentEvents;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use stores::Entity as Stores;
pub use users::Entity as Users;
