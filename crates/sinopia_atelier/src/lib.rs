//! # sinopia_atelier
//!
//! Atelier - The workshop where Sinopia templates are compiled.
//!
//! Three stages, leaves first:
//!
//! - [`preprocess`]: a template string with `[[ … ]]` fragments becomes one
//!   JavaScript expression
//! - [`qualify`]: free identifiers of that script are rewritten into reads
//!   on the evaluation context and recorded as dependencies
//! - [`compile`]: a parsed template becomes rewritten markup plus the
//!   [`ScopeDescriptor`] tree the runtime instantiates
//!
//! ```
//! use sinopia_atelier::compile_template;
//! use sinopia_relief::CompilerOptions;
//!
//! let out = compile_template("<p>[[ greeting ]]</p>", &CompilerOptions::default());
//! assert_eq!(out.root.values[0].referenced_names, ["greeting"]);
//! ```

pub mod compile;
pub mod preprocess;
pub mod qualify;

pub use compile::{compile_document, compile_template, CompiledTemplate};
pub use preprocess::{has_fragment, preprocess};
pub use qualify::{qualify_function, qualify_program, qualify_value, QualifyError};

// Re-export for convenience
pub use sinopia_relief::{CompilerError, CompilerOptions, ScopeDescriptor, ValueDescriptor};
