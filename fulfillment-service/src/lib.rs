//! fulfillment-service: wholesale request, order and challan back office.

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod services;
pub mod startup;
