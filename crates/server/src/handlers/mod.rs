//! HTTP request handlers.

pub mod health;
pub mod resize;

pub use health::*;
pub use resize::*;
