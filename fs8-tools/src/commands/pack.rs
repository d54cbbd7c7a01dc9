//! `fs8 pack` - build a pack from a directory or an explicit file list

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use fs8_archive::PackBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::listfile;

#[derive(Args)]
pub struct PackArgs {
    /// Base directory containing the source files
    pub dir: PathBuf,

    /// Output pack path
    pub output: PathBuf,

    /// Explicit list file (lines of `SOURCE` or `SOURCE ARCHIVE_NAME`);
    /// without it the base directory is packed recursively
    #[arg(long)]
    pub list: Option<PathBuf>,

    /// zstd compression level
    #[arg(long, default_value_t = 1)]
    pub level: i32,

    /// Emit the pack as an ASCII array of 32-bit words for embedding
    #[arg(long)]
    pub hex: bool,

    /// Skip files with this exact name (repeatable)
    #[arg(long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Skip files and directories whose name starts with a dot
    #[arg(long)]
    pub ignore_dotfiles: bool,
}

pub fn handle(args: PackArgs) -> Result<(), Box<dyn Error>> {
    let entries = match &args.list {
        Some(list) => listfile::read_build_list(list)
            .map_err(|e| format!("cannot read list file {}: {e}", list.display()))?,
        None => collect_dir_entries(&args.dir, args.ignore_dotfiles)?,
    };

    let entries: Vec<(String, String)> = entries
        .into_iter()
        .filter(|(source, _)| !is_ignored(source, &args.ignore))
        .collect();

    let count = entries.len();
    debug!("packing {count} file(s) from {:?}", args.dir);

    PackBuilder::new(&args.dir)
        .entries(entries)
        .compression_level(args.level)
        .write_as_hex(args.hex)
        .build(&args.output)?;

    println!("{count} file(s) packed with compression level {}", args.level);
    Ok(())
}

/// Recursively collect files under `dir` as base-relative paths, sorted for
/// reproducible packs.
fn collect_dir_entries(
    dir: &Path,
    ignore_dotfiles: bool,
) -> Result<Vec<(String, String)>, Box<dyn Error>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(dir).into_iter().filter_entry(move |entry| {
        if !ignore_dotfiles || entry.depth() == 0 {
            return true;
        }
        !entry.file_name().to_string_lossy().starts_with('.')
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(dir)?;
        let Some(relative) = relative.to_str() else {
            return Err(format!("non-UTF-8 file name under {}", dir.display()).into());
        };
        entries.push((relative.to_string(), String::new()));
    }

    entries.sort();
    Ok(entries)
}

fn is_ignored(source: &str, ignore: &[String]) -> bool {
    let file_name = source.rsplit(['/', '\\']).next().unwrap_or(source);
    ignore.iter().any(|pattern| pattern == file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_walk_is_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("zeta.txt"), b"z").unwrap();
        std::fs::write(dir.path().join("sub/alpha.txt"), b"a").unwrap();

        let entries = collect_dir_entries(dir.path(), false).unwrap();
        let sources: Vec<_> = entries.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(sources, ["sub/alpha.txt", "zeta.txt"]);
    }

    #[test]
    fn dotfiles_can_be_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), b"x").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::write(dir.path().join("visible.txt"), b"x").unwrap();

        let entries = collect_dir_entries(dir.path(), true).unwrap();
        let sources: Vec<_> = entries.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(sources, ["visible.txt"]);

        let everything = collect_dir_entries(dir.path(), false).unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn ignore_matches_file_names_anywhere() {
        let ignore = vec!["thumbs.db".to_string()];
        assert!(is_ignored("thumbs.db", &ignore));
        assert!(is_ignored("textures/thumbs.db", &ignore));
        assert!(!is_ignored("textures/stone.dds", &ignore));
    }
}
