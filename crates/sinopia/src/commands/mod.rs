//! CLI commands.

pub mod compile;
pub mod render;

use sinopia_relief::CompilerError;

/// Print diagnostics to stderr, one per line.
pub(crate) fn report(errors: &[CompilerError]) {
    for err in errors {
        let severity = if err.is_error() { "error" } else { "warning" };
        eprintln!("{severity}: {err}");
    }
}
