pub mod catalog;
pub mod connection;
pub mod health;
pub mod specials;
pub mod subscribers;
