//! Relief - The static surface of compiled Sinopia templates.
//!
//! Everything the compiler hands to the runtime lives here: the descriptor
//! tree, the key naming conventions both sides dispatch on, compiler
//! diagnostics, and compiler options.

pub mod descriptor;
pub mod errors;
pub mod keys;
pub mod options;

pub use descriptor::{ScopeDescriptor, ValueDescriptor};
pub use errors::{CompilerError, ErrorType};
pub use keys::KeyKind;
pub use options::CompilerOptions;
