pub mod exchangerate_api;

pub use crate::core::quote::QuoteSource;
