//! Pack-then-extract roundtrips through the command handlers

use std::path::Path;

use fs8_tools::commands::extract::{self, ExtractArgs};
use fs8_tools::commands::pack::{self, PackArgs};

fn pack_args(dir: &Path, output: &Path) -> PackArgs {
    PackArgs {
        dir: dir.to_owned(),
        output: output.to_owned(),
        list: None,
        level: 1,
        hex: false,
        ignore: Vec::new(),
        ignore_dotfiles: false,
    }
}

fn extract_args(pack: &Path, out_dir: &Path) -> ExtractArgs {
    ExtractArgs {
        pack: pack.to_owned(),
        names: Vec::new(),
        all: false,
        list: None,
        dir: out_dir.to_owned(),
        size_limit: None,
        just_show_files: false,
    }
}

#[test]
fn pack_directory_then_extract_all() {
    let src = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(src.path().join("maps")).unwrap();
    std::fs::write(src.path().join("readme.txt"), b"read me").unwrap();
    std::fs::write(src.path().join("maps/level1.bin"), vec![9u8; 2048]).unwrap();

    let out = tempfile::tempdir().unwrap();
    let pack = out.path().join("game.fs8");
    pack::handle(pack_args(src.path(), &pack)).unwrap();
    assert!(fs8_archive::verify_signature(&pack).unwrap());

    let extracted = out.path().join("unpacked");
    let mut args = extract_args(&pack, &extracted);
    args.all = true;
    extract::handle(args).unwrap();

    assert_eq!(
        std::fs::read(extracted.join("readme.txt")).unwrap(),
        b"read me"
    );
    assert_eq!(
        std::fs::read(extracted.join("maps/level1.bin")).unwrap(),
        vec![9u8; 2048]
    );
}

#[test]
fn pack_from_list_file_renames_entries() {
    let src = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("settings.blk"), b"fov:r=90").unwrap();
    std::fs::write(src.path().join("notes.txt"), b"draft").unwrap();

    let list = src.path().join("files.txt");
    std::fs::write(&list, "settings.blk config/settings.blk\nnotes.txt\n").unwrap();

    let out = tempfile::tempdir().unwrap();
    let pack = out.path().join("listed.fs8");
    let mut args = pack_args(src.path(), &pack);
    args.list = Some(list);
    pack::handle(args).unwrap();

    let extracted = out.path().join("unpacked");
    let mut args = extract_args(&pack, &extracted);
    args.names = vec!["config/settings.blk".to_string(), "notes.txt".to_string()];
    extract::handle(args).unwrap();

    assert_eq!(
        std::fs::read(extracted.join("config/settings.blk")).unwrap(),
        b"fov:r=90"
    );
    assert_eq!(std::fs::read(extracted.join("notes.txt")).unwrap(), b"draft");
}

#[test]
fn size_limit_stops_extraction() {
    let src = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("big.bin"), vec![1u8; 4096]).unwrap();

    let out = tempfile::tempdir().unwrap();
    let pack = out.path().join("limited.fs8");
    pack::handle(pack_args(src.path(), &pack)).unwrap();

    let mut args = extract_args(&pack, &out.path().join("unpacked"));
    args.all = true;
    args.size_limit = Some(100);
    assert!(extract::handle(args).is_err());
}

#[test]
fn extract_without_selection_fails() {
    let src = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("only.txt"), b"only").unwrap();

    let out = tempfile::tempdir().unwrap();
    let pack = out.path().join("sel.fs8");
    pack::handle(pack_args(src.path(), &pack)).unwrap();

    let args = extract_args(&pack, &out.path().join("unpacked"));
    assert!(extract::handle(args).is_err());
}
