use anyhow::Context;
use auditfs_core::export::{render_list, render_text, to_json};
use auditfs_core::{logging, prefetch_sizes, FilesystemRepository, ReportConfig};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Html,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "auditfs", about = "Directory size report for an installation tree")]
struct Args {
    /// Installation root (overrides the config file)
    root: Option<PathBuf>,
    /// Directory to list, relative to the root
    #[arg(short, long)]
    subdir: Option<PathBuf>,
    /// Directory levels to expand below the listed directory
    #[arg(short, long)]
    depth: Option<usize>,
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// JSON file with report settings
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    decimal_separator: Option<String>,
    #[arg(long)]
    thousands_separator: Option<String>,
    /// Compute sizes one entry at a time
    #[arg(long)]
    sequential: bool,
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(ReportConfig, Option<PathBuf>, Format)> {
        let mut cfg = match &self.config {
            Some(path) => ReportConfig::from_file(path)?,
            None => ReportConfig::default(),
        };
        if let Some(root) = self.root {
            cfg.root = root;
        }
        if let Some(depth) = self.depth {
            cfg.depth = depth;
        }
        if let Some(sep) = self.decimal_separator {
            cfg.size_format.decimal_separator = sep;
        }
        if let Some(sep) = self.thousands_separator {
            cfg.size_format.thousands_separator = sep;
        }
        if self.sequential {
            cfg.parallel_sizes = false;
        }
        Ok((cfg, self.subdir, self.format))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);
    let (cfg, subdir, format) = args.into_config()?;

    let repository = FilesystemRepository::new(&cfg.root);
    let listed_dir = match &subdir {
        Some(rel) => repository.subdirectory_path(rel),
        None => repository.root().to_path_buf(),
    };
    let nodes = match (&subdir, cfg.depth) {
        (None, 1) => repository.list_root(),
        (Some(rel), 1) => repository.list_subdirectory(rel),
        (rel, depth) => repository.list_tree(rel.as_deref().unwrap_or(Path::new("")), depth),
    }
    .with_context(|| format!("cannot list {}", listed_dir.display()))?;
    info!(entries = nodes.len(), path = %listed_dir.display(), "listed");

    if cfg.parallel_sizes {
        prefetch_sizes(&nodes)?;
    }

    let fmt = &cfg.size_format;
    let out = match format {
        Format::Text => render_text(&nodes, fmt)?,
        Format::Html => render_list(&nodes, fmt)?,
        Format::Json => serde_json::to_string_pretty(&to_json(&listed_dir, &nodes, fmt)?)?,
    };
    println!("{}", out.trim_end());
    Ok(())
}
