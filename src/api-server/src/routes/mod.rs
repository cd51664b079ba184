//! Routes mounted outside of endpoint discovery

pub mod public;
