//! Compile command - Compile templates to markup and scope descriptors

use clap::{Args, ValueEnum};
use rayon::prelude::*;
use sinopia::config::{load_config, SinopiaConfig};
use sinopia_atelier::{compile_template, CompiledTemplate};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use super::report;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Output JSON with markup, descriptors and diagnostics
    #[default]
    Json,
    /// Output the rewritten markup only
    Html,
    /// Only show statistics (no output)
    Stats,
}

#[derive(Args)]
pub struct CompileArgs {
    /// Glob pattern(s) to match template files (default: ./**/*.html)
    #[arg(default_value = "./**/*.html")]
    pub patterns: Vec<String>,

    /// Output directory (default: ./dist)
    #[arg(short, long, default_value = "./dist")]
    pub output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Number of threads (default: number of CPUs)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Show timing profile breakdown
    #[arg(long)]
    pub profile: bool,

    /// Continue writing output for files with errors
    #[arg(long)]
    pub continue_on_error: bool,
}

impl Default for CompileArgs {
    fn default() -> Self {
        Self {
            patterns: vec!["./**/*.html".to_string()],
            output: PathBuf::from("./dist"),
            format: OutputFormat::default(),
            threads: None,
            profile: false,
            continue_on_error: false,
        }
    }
}

#[derive(Debug, Default)]
struct CompileStats {
    success: AtomicUsize,
    failed: AtomicUsize,
    scopes: AtomicUsize,
}

pub fn run(args: CompileArgs) {
    let start = Instant::now();

    if let Some(threads) = args.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            eprintln!("Failed to configure thread pool: {}", e);
            std::process::exit(1);
        }
    }

    let config = load_config(None);
    let files = collect_files(&args.patterns);

    if files.is_empty() {
        eprintln!("No template files found matching the patterns");
        std::process::exit(1);
    }

    let stats = CompileStats::default();
    let collect_elapsed = start.elapsed();

    if args.profile {
        eprintln!(
            "Found {} files in {:.4}s. Compiling using {} threads...",
            files.len(),
            collect_elapsed.as_secs_f64(),
            rayon::current_num_threads()
        );
    }

    let compile_start = Instant::now();
    let results: Vec<_> = files
        .par_iter()
        .filter_map(|path| match compile_file(path, &config) {
            Ok(output) => {
                report(&output.errors);
                if output.has_errors() {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    if !args.continue_on_error {
                        return None;
                    }
                } else {
                    stats.success.fetch_add(1, Ordering::Relaxed);
                }
                stats
                    .scopes
                    .fetch_add(count_scopes(&output), Ordering::Relaxed);
                Some((path.clone(), output))
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                eprintln!("Error compiling {}: {}", path.display(), e);
                None
            }
        })
        .collect();
    let compile_elapsed = compile_start.elapsed();

    let io_start = Instant::now();
    if !matches!(args.format, OutputFormat::Stats) {
        if let Err(e) = fs::create_dir_all(&args.output) {
            eprintln!("Failed to create {}: {}", args.output.display(), e);
            std::process::exit(1);
        }
        for (path, output) in results {
            write_output(&path, &output, &args);
        }
    }
    let io_elapsed = io_start.elapsed();

    let total_elapsed = start.elapsed();
    let success = stats.success.load(Ordering::Relaxed);
    let failed = stats.failed.load(Ordering::Relaxed);
    info!(
        success,
        failed,
        scopes = stats.scopes.load(Ordering::Relaxed),
        "compile finished"
    );

    if args.profile {
        eprintln!();
        eprintln!("Timing breakdown:");
        eprintln!("  File collection: {:.4}s", collect_elapsed.as_secs_f64());
        eprintln!("  Compilation:     {:.4}s", compile_elapsed.as_secs_f64());
        eprintln!("  I/O operations:  {:.4}s", io_elapsed.as_secs_f64());
        eprintln!("  Total:           {:.4}s", total_elapsed.as_secs_f64());
        eprintln!();
    }

    if failed > 0 {
        eprintln!(
            "✗ {} file(s) failed, {} compiled in {:.4}s",
            failed,
            success,
            total_elapsed.as_secs_f64()
        );
        std::process::exit(1);
    }

    let file_word = if success == 1 { "file" } else { "files" };
    eprintln!(
        "✓ {} {} compiled in {:.4}s",
        success,
        file_word,
        total_elapsed.as_secs_f64()
    );
}

fn collect_files(patterns: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_dir() {
            let nested = format!("{}/**/*.html", pattern.trim_end_matches('/'));
            files.extend(glob_files(&nested));
        } else {
            files.extend(glob_files(pattern));
        }
    }

    files.sort();
    files.dedup();
    files
}

fn glob_files(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths
            .flatten()
            .filter(|path| path.is_file())
            .collect(),
        Err(e) => {
            eprintln!("Invalid pattern {}: {}", pattern, e);
            Vec::new()
        }
    }
}

fn compile_file(path: &Path, config: &SinopiaConfig) -> Result<CompiledTemplate, String> {
    let source = fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;
    let options = config.compiler_options(path);
    debug!(origin = %options.origin, bytes = source.len(), "compiling");
    Ok(compile_template(&source, &options))
}

fn count_scopes(output: &CompiledTemplate) -> usize {
    let mut count = 0;
    let mut stack = vec![&output.root];
    while let Some(scope) = stack.pop() {
        count += 1;
        stack.extend(scope.children.iter());
    }
    count
}

fn write_output(path: &Path, output: &CompiledTemplate, args: &CompileArgs) {
    let (ext, content) = match args.format {
        OutputFormat::Json => match serde_json::to_string_pretty(output) {
            Ok(json) => ("json", json),
            Err(e) => {
                eprintln!("Failed to serialize {}: {}", path.display(), e);
                return;
            }
        },
        OutputFormat::Html => ("html", output.markup.clone()),
        OutputFormat::Stats => return,
    };

    let filename = path
        .file_name()
        .map(|f| PathBuf::from(f).with_extension(ext))
        .unwrap_or_else(|| PathBuf::from("output").with_extension(ext));
    let out_path = args.output.join(filename);

    fs::write(&out_path, content).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {}", out_path.display(), e);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use sinopia_relief::CompilerOptions;

    #[test]
    fn scope_count_includes_nested() {
        let output = compile_template(
            r#"<ul :items="[]"><li :data="[[ items ]]"><b v="[[ data ]]"></b></li></ul>"#,
            &CompilerOptions::default(),
        );
        assert_eq!(count_scopes(&output), 3);
    }

    #[test]
    fn missing_pattern_matches_nothing() {
        assert!(collect_files(&["./does-not-exist/**/*.html".to_string()]).is_empty());
    }
}
