//! Carton - The artist's toolbox for Sinopia.
//!
//! This crate provides the small shared utilities every other Sinopia crate
//! reaches for: fast hash collections, compact strings, and the naming and
//! tag tables used by both the compiler and the runtime.
//!
//! # Modules
//!
//! - **general**: case conversion and identifier checks
//! - **dom_tag_config**: void and raw-text element tables
//!
//! # Example
//!
//! ```
//! use sinopia_carton::{camelize, hyphenate};
//!
//! assert_eq!(camelize("data-item-id"), "dataItemId");
//! assert_eq!(hyphenate("dataItemId"), "data-item-id");
//! ```

pub mod dom_tag_config;
pub mod general;

// Re-export compact_str::CompactString for convenience
pub use compact_str::CompactString;

// Re-export smallvec for stack-optimized collections
pub use smallvec::{smallvec, SmallVec};

// Re-export rustc-hash for fast hash maps/sets
pub use rustc_hash::{FxHashMap, FxHashSet};

// Re-export phf for compile-time perfect hash functions
pub use phf::{phf_set, Set as PhfSet};

// Re-export shared utilities
pub use dom_tag_config::*;
pub use general::*;
