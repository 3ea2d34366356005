//! Command-line interface for docdrift.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config;
use crate::drift::{ChangeSet, FsWorkspace, Severity, Synthesizer, Workspace};
use crate::extract::Extractor;
use crate::facts::{Fact, FactKind, KindSet};
use crate::matcher::globs::normalize_separators;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Documentation and policy drift detection.
///
/// docdrift extracts functions, routes, env vars and other structural facts
/// from source files and reports where the documentation or the policy
/// documents no longer agree with the code.
#[derive(Parser)]
#[command(name = "docdrift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log debug output to stderr (overrides DOCDRIFT_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare code against docs and policy
    #[command(visible_alias = "scan")]
    Check(CheckArgs),
    /// Print the facts extracted from source files
    Facts(FactsArgs),
    /// Write a starter config file
    Init(InitArgs),
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Repository root
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Path to config YAML file (default: auto-discover in the root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Changed file, relative to the root (repeatable; default: every file)
    #[arg(long = "changed", value_name = "FILE")]
    pub changed: Vec<String>,

    /// Unified diff of the change, for rename and policy checks
    #[arg(long, value_name = "PATCH")]
    pub diff: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Lowest severity that fails the run: info, warning, error or critical
    #[arg(long, default_value = "error")]
    pub fail_on: String,
}

/// Arguments for the facts command.
#[derive(Parser)]
pub struct FactsArgs {
    /// Files or directories to extract from
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Comma-separated fact kinds (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub kinds: Vec<String>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "docdrift.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

fn check_format(format: &str) -> bool {
    if format == "pretty" || format == "json" {
        return true;
    }
    eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", format);
    false
}

/// `--changed` values as workspace paths.
fn normalize_changed(changed: &[String]) -> Vec<String> {
    changed
        .iter()
        .map(|c| normalize_separators(c.trim()))
        .filter(|c| !c.is_empty())
        .collect()
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }
    let fail_on: Severity = match args.fail_on.parse() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: --fail-on: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if !args.root.is_dir() {
        eprintln!("Error: not a directory: {}", args.root.display());
        return Ok(EXIT_ERROR);
    }

    let (config_path, config) = match config::load(args.config.as_deref(), &args.root) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error: {}", e);
            if matches!(e, config::ConfigError::NotFound) {
                eprintln!("Run 'docdrift init' to create a config file");
            }
            return Ok(EXIT_ERROR);
        }
    };

    let settings = match config.compile() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: invalid config: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let mut changes = if args.changed.is_empty() {
        ChangeSet::all()
    } else {
        ChangeSet::files(normalize_changed(&args.changed))
    };
    if let Some(diff_path) = &args.diff {
        let diff = std::fs::read_to_string(diff_path)
            .with_context(|| format!("reading diff {}", diff_path.display()))?;
        changes = changes.with_diff(diff);
    }

    let workspace = FsWorkspace::new(&args.root);
    let result = Synthesizer::new(&settings).run(&workspace, &changes)?;

    let root = args.root.to_string_lossy().to_string();
    let config_str = config_path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&root, &config_str, &result, fail_on)?,
        _ => report::write_pretty(&root, &config_str, &result, fail_on),
    }

    if result.fails_at(fail_on) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Extract facts from every supported file under `path`.
fn facts_under(extractor: &Extractor, path: &Path, kinds: KindSet) -> anyhow::Result<Vec<Fact>> {
    if path.is_file() {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = normalize_separators(&path.to_string_lossy());
        return Ok(match extractor.extract_bytes(&bytes, &name, kinds) {
            Ok(facts) => facts,
            Err(reason) => {
                tracing::warn!(file = %name, %reason, "skipping file");
                Vec::new()
            }
        });
    }

    let workspace = FsWorkspace::new(path);
    let mut facts = Vec::new();
    for file in workspace.list_files()? {
        if !extractor.supports(&file) {
            continue;
        }
        let bytes = workspace.read_bytes(&file)?;
        match extractor.extract_bytes(&bytes, &file, kinds) {
            Ok(found) => facts.extend(found),
            Err(reason) => tracing::warn!(file = %file, %reason, "skipping file"),
        }
    }
    Ok(facts)
}

/// Run the facts command.
pub fn run_facts(args: &FactsArgs) -> anyhow::Result<i32> {
    if !check_format(&args.format) {
        return Ok(EXIT_ERROR);
    }
    let kinds = if args.kinds.is_empty() {
        KindSet::all()
    } else {
        let mut set = KindSet::empty();
        for k in &args.kinds {
            match FactKind::parse(k) {
                Some(kind) => set.insert(kind),
                None => {
                    eprintln!("Error: unknown fact kind {:?}", k);
                    return Ok(EXIT_ERROR);
                }
            }
        }
        set
    };

    let extractor = Extractor::default();
    let mut facts = Vec::new();
    for path in &args.paths {
        facts.extend(facts_under(&extractor, path, kinds)?);
    }

    match args.format.as_str() {
        "json" => report::write_facts_json(&facts)?,
        _ => report::write_facts_pretty(&facts),
    }
    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() && !args.force {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or pass --force to overwrite");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, config::TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the rules in {} to match your layout", args.output.display());
    println!("  2. Run: docdrift check . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_changed() {
        let changed = vec!["./src/a.ts".to_string(), "src\\b.ts".to_string(), " ".to_string()];
        assert_eq!(normalize_changed(&changed), vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn test_cli_parses_check() {
        let cli = Cli::parse_from([
            "docdrift", "scan", "repo", "--changed", "a.ts", "--changed", "b.ts", "--fail-on", "warning",
        ]);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.root, PathBuf::from("repo"));
                assert_eq!(args.changed, vec!["a.ts", "b.ts"]);
                assert_eq!(args.fail_on, "warning");
                assert_eq!(args.format, "pretty");
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_init_writes_valid_template() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/docdrift.yaml");
        let args = InitArgs { output: output.clone(), force: false };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        let written = config::Config::parse_file(&output).unwrap();
        assert!(config::validate(&written).is_ok());
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);
    }
}
