//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use arcbrowse::{ArchiveCache, ImageFilter, PathResolver, VirtualFs};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// One item to put into a fixture archive. `None` content means a directory.
pub type FixtureEntry<'a> = (&'a str, Option<&'a [u8]>);

pub fn write_zip(path: &Path, entries: &[FixtureEntry<'_>], method: CompressionMethod) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default().compression_method(method);
    for (name, content) in entries {
        match content {
            Some(data) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
            None => zip.add_directory(*name, options).unwrap(),
        }
    }
    zip.finish().unwrap();
}

pub fn write_zip_with_comment(path: &Path, entries: &[FixtureEntry<'_>], comment: &str) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.set_comment(comment);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.unwrap_or_default()).unwrap();
    }
    zip.finish().unwrap();
}

/// The fixture from the listing examples: a nested image, its explicit
/// directory record, and a root-level image.
pub fn sample_zip(path: &Path) {
    write_zip(
        path,
        &[
            ("a/b.png", Some(b"b-image".as_slice())),
            ("a/", None),
            ("c.png", Some(b"c-image".as_slice())),
        ],
        CompressionMethod::Deflated,
    );
}

pub fn vfs(root: &Path) -> VirtualFs {
    vfs_with(root, ImageFilter::default())
}

pub fn vfs_with(root: &Path, images: ImageFilter) -> VirtualFs {
    VirtualFs::new(
        PathResolver::new(root),
        Arc::new(ArchiveCache::default()),
        images,
    )
}

/// Whether a `7z` program is available on PATH.
pub fn seven_zip_available() -> bool {
    Command::new("7z")
        .arg("i")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Build a 7z archive from a staging directory with the `7z` program.
pub fn write_7z(path: &Path, entries: &[FixtureEntry<'_>]) {
    let staging = tempfile::tempdir().unwrap();
    for (name, content) in entries {
        let target = staging.path().join(name);
        match content {
            Some(data) => {
                std::fs::create_dir_all(target.parent().unwrap()).unwrap();
                std::fs::write(&target, data).unwrap();
            }
            None => std::fs::create_dir_all(&target).unwrap(),
        }
    }

    let top_level: Vec<_> = std::fs::read_dir(staging.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    let status = Command::new("7z")
        .arg("a")
        .arg(path)
        .args(&top_level)
        .current_dir(staging.path())
        .stdout(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
}

/// Technical listing printed by [`fake_seven_zip`] for `l`.
pub const FAKE_LISTING: &str = "\
Listing archive: fake.7z

--
Path = fake.7z
Type = 7z

----------
Path = pages
Attributes = D

Path = pages/ok.png
Attributes = A

Path = pages/[1].png
Attributes = A

Path = pages/broken.png
Attributes = A

Path = pages/late.bin
Attributes = A
";

/// Write a stand-in `7z` program into `dir` and a 7z-signed archive next
/// to it. Returns (program, archive).
///
/// The program prints [`FAKE_LISTING`] for `l`. For `x` it records its
/// arguments in `<program>.args` and emits content keyed by the entry name:
/// `broken.png` writes a few bytes then fails, `late.bin` fails after
/// 100000 bytes.
#[cfg(unix)]
pub fn fake_seven_zip(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    use std::os::unix::fs::PermissionsExt;

    let program = dir.join("fake-7z");
    let script = format!(
        r#"#!/bin/sh
case "$1" in
  l)
    cat <<'LISTING'
{FAKE_LISTING}LISTING
    ;;
  x)
    printf '%s\n' "$@" > "$0.args"
    for entry; do :; done
    case "$entry" in
      pages/ok.png) printf 'ok-image' ;;
      'pages/[1].png') printf 'literal' ;;
      pages/broken.png) printf 'par'; exit 2 ;;
      pages/late.bin) head -c 100000 /dev/zero; exit 2 ;;
      *) exit 1 ;;
    esac
    ;;
  *) exit 7 ;;
esac
"#
    );
    std::fs::write(&program, script).unwrap();
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

    let archive = dir.join("fake.7z");
    std::fs::write(&archive, b"7z\xBC\xAF\x27\x1C\x00\x04").unwrap();
    (program, archive)
}

/// Arguments the fake program received on its last extraction.
#[cfg(unix)]
pub fn fake_seven_zip_args(program: &Path) -> Vec<String> {
    let mut log = program.as_os_str().to_owned();
    log.push(".args");
    std::fs::read_to_string(log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
