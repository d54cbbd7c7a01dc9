//! `fs8 extract` - pull files back out of a pack

use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use fs8_archive::Fs8Reader;
use tracing::debug;

use crate::listfile;

#[derive(Args)]
pub struct ExtractArgs {
    /// Pack to read
    pub pack: PathBuf,

    /// Archive names to extract
    pub names: Vec<String>,

    /// Extract every file in the pack
    #[arg(long)]
    pub all: bool,

    /// Read archive names from a list file, one per line
    #[arg(long)]
    pub list: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Refuse to extract once the cumulative decompressed size passes this
    /// many bytes
    #[arg(long, value_name = "N")]
    pub size_limit: Option<u64>,

    /// Print the sorted file listing and exit
    #[arg(long)]
    pub just_show_files: bool,
}

pub fn handle(args: ExtractArgs) -> Result<(), Box<dyn Error>> {
    let reader = Fs8Reader::open_file(&args.pack)
        .map_err(|e| format!("cannot open pack {}: {e}", args.pack.display()))?;

    if args.just_show_files {
        let mut names = reader.file_names();
        names.sort();
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    std::fs::create_dir_all(&args.dir)
        .map_err(|e| format!("cannot create directory {}: {e}", args.dir.display()))?;

    let mut names = args.names.clone();
    if args.all {
        names = reader.file_names();
        if names.is_empty() {
            return Err(format!("archive '{}' is empty", args.pack.display()).into());
        }
    } else if let Some(list) = &args.list {
        names.extend(
            listfile::read_name_list(list)
                .map_err(|e| format!("cannot read list file {}: {e}", list.display()))?,
        );
    }

    if names.is_empty() {
        return Err("expected --all, --list or file names to extract".into());
    }

    names.sort();

    let mut size_sum = 0u64;
    for name in &names {
        size_sum += reader.size(name);
        if args.size_limit.is_some_and(|limit| size_sum > limit) {
            return Err("total size of extracted files is over the limit".into());
        }

        let bytes = reader
            .read(name)
            .map_err(|e| format!("cannot extract file {name}: {e}"))?;

        let out_path = args.dir.join(name);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create directory {}: {e}", parent.display()))?;
        }

        debug!("extracting {name} ({} bytes)", bytes.len());
        std::fs::write(&out_path, &bytes)
            .map_err(|e| format!("cannot create file {}: {e}", out_path.display()))?;
    }

    println!("Extracted {} file(s)", names.len());
    Ok(())
}
