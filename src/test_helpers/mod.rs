//! A set of helpers for testing

mod alert;

pub use alert::{test_route, AlertBuilder};
