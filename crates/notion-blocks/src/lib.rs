//! Notion-Blocks: Notion API adapter for Spec Mirror
//!
//! Lists the direct children of a spec page and patches individual blocks,
//! implementing `spec_mirror_core::DocumentStore` over `reqwest`.
//!
//! ## Key Components
//!
//! - `NotionClient`: the store implementation
//! - `NotionConfig`: token, API base and timeout
//! - `wire`: JSON shapes of block listings and update bodies

mod client;
pub mod wire;

pub use client::{NotionClient, NotionConfig, DEFAULT_API_BASE, DEFAULT_TIMEOUT, NOTION_VERSION};
