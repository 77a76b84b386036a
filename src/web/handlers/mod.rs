//! HTTP handlers organised by resource

pub mod env;
pub mod health;
pub mod records;
pub mod sync;
