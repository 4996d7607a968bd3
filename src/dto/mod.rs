pub mod addresses;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod stores;
