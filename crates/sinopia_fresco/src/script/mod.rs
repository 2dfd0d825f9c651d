//! Evaluator execution.
//!
//! Evaluator sources are parsed with OXC, lowered once into an owned tree
//! ([`ast`]) and run by a small tree-walking [`interp`]reter.

pub mod ast;
mod builtins;
mod interp;
mod lower;

pub use builtins::{globals, Native};
pub use interp::{call_function, instantiate, Closure, Host, Interpreter, STEP_BUDGET};
pub use lower::compile_function;
