use anyhow::Context;
use clap::{Parser, Subcommand};
use merge_engine::{
    check, merge_trees, Arena, ExportedNode, LabelSimilarity, MergeContext, MergeInput, Revision,
    TreeDoc,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use treemerge_core::config::Settings;
use treemerge_core::logging::{init_console_logging, init_logging};

#[derive(Parser)]
#[command(
    name = "treemerge",
    about = "Structured three-way merge of program trees"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to .treemerge data directory
    #[arg(long, default_value = ".treemerge", global = true)]
    data_dir: PathBuf,

    /// Write logs to treemerge.log in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Settings file (defaults to <data-dir>/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge left and right tree documents against their common base
    Merge {
        #[arg(long)]
        left: PathBuf,
        /// Omit for a two-way merge
        #[arg(long)]
        base: Option<PathBuf>,
        #[arg(long)]
        right: PathBuf,
        /// Write the merged tree here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Override the similarity threshold
        #[arg(long)]
        threshold: Option<f64>,
        /// Emit choice nodes instead of conflicts
        #[arg(long)]
        conditional: bool,
    },
    /// Compare an actual merged tree with the expected one
    Check {
        #[arg(long)]
        expected: PathBuf,
        #[arg(long)]
        actual: PathBuf,
    },
    /// Write a default settings file
    InitConfig,
}

fn settings_path(cli: &Cli) -> PathBuf {
    cli.settings
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("settings.json"))
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::load_or_default(&settings_path(&cli))?;

    let log_dir = cli.log_dir.clone().or_else(|| {
        settings
            .logging
            .enabled
            .then(|| settings.logging.directory.clone())
    });
    let _guard = match &log_dir {
        Some(dir) => Some(init_logging(dir)?),
        None => {
            init_console_logging();
            None
        }
    };

    // exit through main so the log guard is dropped and flushes
    let clean = match &cli.command {
        Commands::Merge {
            left,
            base,
            right,
            output,
            threshold,
            conditional,
        } => cmd_merge(
            &settings,
            MergeArgs {
                left,
                base: base.as_deref(),
                right,
                output: output.as_deref(),
                threshold: *threshold,
                conditional: *conditional,
            },
        ),
        Commands::Check { expected, actual } => cmd_check(&settings, expected, actual),
        Commands::InitConfig => cmd_init_config(&cli).map(|()| true),
    }?;

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

struct MergeArgs<'a> {
    left: &'a Path,
    base: Option<&'a Path>,
    right: &'a Path,
    output: Option<&'a Path>,
    threshold: Option<f64>,
    conditional: bool,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid tree document {}", path.display()))
}

/// Returns whether the merged tree is free of conflicts.
fn cmd_merge(settings: &Settings, args: MergeArgs<'_>) -> anyhow::Result<bool> {
    let mut config = settings.merge_config()?;
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if args.conditional {
        config.conditional_merge = true;
    }

    let mut arena = Arena::new();
    let left = arena.load(&read_json::<TreeDoc>(args.left)?, Revision::Left)?;
    let right = arena.load(&read_json::<TreeDoc>(args.right)?, Revision::Right)?;
    let base = match args.base {
        Some(path) => Some(arena.load(&read_json::<TreeDoc>(path)?, Revision::Base)?),
        None => None,
    };

    tracing::info!(
        "Merging {} and {} (base: {})",
        args.left.display(),
        args.right.display(),
        args.base.map_or_else(|| "none".to_string(), |p| p.display().to_string())
    );

    let mut ctx = MergeContext::new(config);
    let input = MergeInput {
        left,
        base,
        right,
    };
    let outcome = merge_trees(&mut arena, input, &mut ctx).context("merge failed")?;

    let exported = arena.export(outcome.target)?;
    let merged = serde_json::to_string_pretty(&exported)?;
    match args.output {
        Some(path) => {
            std::fs::write(path, &merged)?;
            tracing::info!("Merged tree written to {}", path.display());
        }
        None => println!("{}", merged),
    }

    let stats = outcome.stats;
    eprintln!(
        "{}: {} added, {} deleted, {} merged, {} conflicts, {} choices",
        outcome.merge_type, stats.adds, stats.deletes, stats.merges, stats.conflicts, stats.choices
    );

    Ok(exported.conflict_count() == 0)
}

/// Returns whether the actual tree fully matches the expected one.
fn cmd_check(settings: &Settings, expected: &Path, actual: &Path) -> anyhow::Result<bool> {
    let config = settings.merge_config()?;

    let mut arena = Arena::new();
    let e = arena.load_exported(&read_json::<ExportedNode>(expected)?, Revision::Expected)?;
    let a = arena.load_exported(&read_json::<ExportedNode>(actual)?, Revision::Target)?;

    let report = check(&arena, e, a, &config.strategies, &LabelSimilarity)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.fully_matched {
        tracing::warn!(
            "{} unmatched nodes ({:.1}%)",
            report.unmatched,
            report.unmatched_rate * 100.0
        );
    }
    Ok(report.fully_matched)
}

fn cmd_init_config(cli: &Cli) -> anyhow::Result<()> {
    let path = settings_path(cli);
    Settings::default().save(&path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, json: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, json).unwrap();
        path
    }

    fn block(labels: &[&str]) -> String {
        let children: Vec<String> = labels
            .iter()
            .map(|l| format!(r#"{{"kind":"stmt","label":"{l}"}}"#))
            .collect();
        format!(r#"{{"kind":"block","children":[{}]}}"#, children.join(","))
    }

    fn merge_args<'a>(left: &'a Path, base: &'a Path, right: &'a Path, output: &'a Path) -> MergeArgs<'a> {
        MergeArgs {
            left,
            base: Some(base),
            right,
            output: Some(output),
            threshold: None,
            conditional: false,
        }
    }

    #[test]
    fn test_conflicting_merge_returns_instead_of_exiting() {
        let dir = tempfile::tempdir().unwrap();
        let base = write(dir.path(), "base.json", &block(&["a"]));
        let left = write(dir.path(), "left.json", &block(&["a", "x"]));
        let right = write(dir.path(), "right.json", &block(&["a", "y"]));
        let output = dir.path().join("merged.json");

        let clean = cmd_merge(&Settings::default(), merge_args(&left, &base, &right, &output)).unwrap();
        assert!(!clean);
        let merged = std::fs::read_to_string(&output).unwrap();
        assert!(merged.contains("conflict"));

        // the conflicting output fails the check without ending the process
        let expected = write(dir.path(), "expected.json", &block(&["a", "x"]));
        assert!(!cmd_check(&Settings::default(), &expected, &output).unwrap());
    }

    #[test]
    fn test_conditional_merge_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let base = write(dir.path(), "base.json", &block(&["a"]));
        let left = write(dir.path(), "left.json", &block(&["a", "x"]));
        let right = write(dir.path(), "right.json", &block(&["a", "y"]));
        let output = dir.path().join("merged.json");

        let args = MergeArgs {
            conditional: true,
            ..merge_args(&left, &base, &right, &output)
        };
        assert!(cmd_merge(&Settings::default(), args).unwrap());
        assert!(std::fs::read_to_string(&output).unwrap().contains("choice"));
    }

    #[test]
    fn test_clean_merge_passes_check() {
        let dir = tempfile::tempdir().unwrap();
        let base = write(dir.path(), "base.json", &block(&["a", "b"]));
        let left = write(dir.path(), "left.json", &block(&["a", "x", "b"]));
        let right = write(dir.path(), "right.json", &block(&["a", "b", "y"]));
        let output = dir.path().join("merged.json");

        assert!(cmd_merge(&Settings::default(), merge_args(&left, &base, &right, &output)).unwrap());
        let expected = write(dir.path(), "expected.json", &block(&["a", "x", "b", "y"]));
        assert!(cmd_check(&Settings::default(), &expected, &output).unwrap());
    }
}
