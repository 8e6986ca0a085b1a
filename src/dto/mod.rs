pub mod auth;
pub mod cart;
pub mod dashboard;
pub mod products;
pub mod reports;
