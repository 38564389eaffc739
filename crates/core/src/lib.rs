//! Core domain types and shared logic for the vignette thumbnail proxy.
//!
//! This crate holds everything the pipeline decides without doing I/O:
//! - Size token resolution
//! - Source reference parsing
//! - Cache key derivation
//! - Output format classification and entity tags
//! - Configuration

pub mod cache_key;
pub mod config;
pub mod error;
pub mod hash;
pub mod image;
pub mod size;
pub mod source;
pub mod thumbnail;

pub use cache_key::CacheKey;
pub use error::{Error, Result};
pub use hash::{ContentHash, content_etag};
pub use image::ImageKind;
pub use size::{Dimensions, SizePolicy};
pub use source::SourceRef;
pub use thumbnail::{CacheEntry, RenderResult, ThumbnailRequest};
