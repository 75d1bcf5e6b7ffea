//! Gateway module - HTTP adapter for the eBay pricing service

pub mod messages;
pub mod rest;

pub use rest::HttpGateway;
