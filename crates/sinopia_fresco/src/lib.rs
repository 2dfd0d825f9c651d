//! # sinopia_fresco
//!
//! Fresco - The living layer painted over a Sinopia template.
//!
//! The runtime half of Sinopia. A [`Page`] turns the descriptor tree produced
//! by `sinopia_atelier` into a tree of [`Scope`]s holding reactive
//! [`Value`]s, keeps their dependency edges, evaluates compiled evaluators
//! with a small JavaScript interpreter ([`script`]) and writes results back
//! into the document.
//!
//! ## Refresh
//!
//! [`Page::refresh`] runs three separate depth-first walks: unlink every
//! value, link every value, then evaluate every value. Reads are pull-based,
//! so a value read out of order is evaluated on the spot.
//!
//! ## Lists
//!
//! A child scope declaring a computed `data` value is a list template. It keeps
//! one clone per array element except the last, which the template itself
//! represents.

mod build;
pub mod cell;
pub mod environment;
pub mod error;
mod events;
mod graph;
pub mod page;
mod replicate;
pub mod scope;
pub mod script;
pub mod value;

pub use cell::{Formula, SyncTarget, Value, ValueId};
pub use environment::Environment;
pub use error::{EvalError, EvalResult, PageError};
pub use page::{Accessor, Page};
pub use scope::{Scope, ScopeId};
pub use value::JsValue;
