//! # Sinopia
//!
//! Reactive HTML templates: a static compiler and a runtime scope graph.
//!
//! This crate re-exports all Sinopia sub-crates for unified documentation.
//!
//! ## Crates
//!
//! - [`carton`] - Shared collections and naming utilities
//! - [`relief`] - Descriptor data model, options and diagnostics
//! - [`armature`] - HTML tokenizer, parser and mutable document
//! - [`atelier`] - Template compiler
//! - [`fresco`] - Reactive runtime

/// Shared collections and naming utilities.
pub use sinopia_carton as carton;

/// Descriptor data model, options and diagnostics.
pub use sinopia_relief as relief;

/// HTML tokenizer, parser and mutable document.
pub use sinopia_armature as armature;

/// Template compiler.
pub use sinopia_atelier as atelier;

/// Reactive runtime.
pub use sinopia_fresco as fresco;

pub mod config;
