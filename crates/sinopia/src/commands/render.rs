//! Render command - Compile a template and paint it once through the runtime

use clap::Args;
use sinopia::config::load_config;
use sinopia_armature::parse;
use sinopia_atelier::compile_template;
use sinopia_fresco::Page;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use super::report;

#[derive(Args)]
pub struct RenderArgs {
    /// Template file to render
    pub input: PathBuf,

    /// Write the HTML here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Extra global as NAME=JSON, overriding the config file (repeatable)
    #[arg(short = 'g', long = "global", value_name = "NAME=JSON")]
    pub globals: Vec<String>,
}

pub fn run(args: RenderArgs) {
    let config = load_config(None);

    let source = match fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read {}: {}", args.input.display(), e);
            std::process::exit(1);
        }
    };

    let compiled = compile_template(&source, &config.compiler_options(&args.input));
    report(&compiled.errors);
    if compiled.has_errors() {
        std::process::exit(1);
    }

    let mut environment = config.environment();
    for global in &args.globals {
        match parse_global(global) {
            Ok((name, value)) => {
                environment.globals.insert(name, value);
            }
            Err(e) => {
                eprintln!("Invalid --global {}: {}", global, e);
                std::process::exit(1);
            }
        }
    }

    let (document, _) = parse(&compiled.markup);
    let mut page = match Page::new(document, &compiled.root, environment) {
        Ok(page) => page,
        Err(e) => {
            eprintln!("Failed to build {}: {}", args.input.display(), e);
            std::process::exit(1);
        }
    };
    page.refresh();
    if let Some(err) = page.take_last_error() {
        warn!("{}: {}", args.input.display(), err);
    }
    info!(?page, "rendered");

    let html = page.to_html();
    match &args.output {
        Some(path) => fs::write(path, html).unwrap_or_else(|e| {
            eprintln!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => println!("{html}"),
    }
}

/// Split `NAME=JSON`; a value that is not valid JSON is taken as a string.
fn parse_global(arg: &str) -> Result<(String, serde_json::Value), String> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| "expected NAME=JSON".to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("empty name".to_string());
    }
    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn global_arguments() {
        assert_eq!(parse_global("n=3"), Ok(("n".to_string(), json!(3))));
        assert_eq!(
            parse_global("items=[1,2]"),
            Ok(("items".to_string(), json!([1, 2])))
        );
        assert_eq!(
            parse_global("title=Home"),
            Ok(("title".to_string(), json!("Home")))
        );
        assert!(parse_global("flag").is_err());
        assert!(parse_global("=1").is_err());
    }
}
