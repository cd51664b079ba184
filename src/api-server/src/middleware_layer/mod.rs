//! Middleware applied around every route

pub mod cors;
pub mod logging;
