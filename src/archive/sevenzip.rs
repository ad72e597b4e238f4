use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context as TaskContext, Poll, ready};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};

use super::{ArchiveBackend, ArchiveEntry, ArchiveFormat, EntryKind, EntryReader, find_file};
use crate::error::{Error, Result};

/// Line separating the archive header block from the entry blocks in `7z l -slt`.
const ENTRY_SECTION_MARKER: &str = "----------";

/// Bytes read from the decoder before `open_file` returns. Entries that fit
/// are fully decoded, and their exit status checked, before any response.
const PREFETCH_SIZE: usize = 64 * 1024;

/// Sequential-entry 7z backend driven by an external `7z` program.
///
/// The entry index comes from the technical listing (`7z l -slt`); each
/// read spawns `7z x -so` and streams the decoder's stdout.
pub struct SevenZipArchive {
    path: PathBuf,
    program: OsString,
    entries: Vec<ArchiveEntry>,
    /// Names exactly as 7z reported them, index-aligned with `entries`
    raw_names: Vec<String>,
}

impl SevenZipArchive {
    /// Index the archive at `path` by running `program l -slt`.
    ///
    /// A program that cannot be run or exits unsuccessfully is reported as
    /// [`Error::BackendOpen`].
    pub async fn open(path: &Path, program: &OsStr) -> Result<Self> {
        let open_err = |source| Error::BackendOpen {
            path: path.to_path_buf(),
            source,
        };

        let output = Command::new(program)
            .args(["l", "-slt", "--"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", program.to_string_lossy()))
            .map_err(open_err)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(open_err(anyhow!(
                "{} exited with {}: {}",
                program.to_string_lossy(),
                output.status,
                stderr.trim()
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let items = parse_technical_listing(&listing);
        let entries = items
            .iter()
            .map(|item| ArchiveEntry::new(&item.path, item.kind))
            .collect();
        let raw_names = items.into_iter().map(|item| item.path).collect::<Vec<_>>();

        tracing::info!("Indexed 7z {:?}: {} entries", path, raw_names.len());
        Ok(Self {
            path: path.to_path_buf(),
            program: program.to_os_string(),
            entries,
            raw_names,
        })
    }

    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ArchiveBackend for SevenZipArchive {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    async fn open_file(&self, path: &str) -> Result<EntryReader> {
        let index = find_file(&self.entries, path)?;
        let raw_name = &self.raw_names[index];

        let mut child = Command::new(&self.program)
            // -spd: the entry name is literal, not a wildcard
            .args(["x", "-so", "-y", "-bd", "-spd", "-r-", "--"])
            .arg(&self.path)
            .arg(raw_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::EntryRead {
                entry: raw_name.clone(),
                source: anyhow!(e).context("Failed to spawn 7z decoder"),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::EntryRead {
            entry: raw_name.clone(),
            source: anyhow!("7z decoder has no stdout"),
        })?;
        let mut stream = DecoderStream {
            entry: raw_name.clone(),
            stdout,
            state: DecoderState::Reading(child),
        };

        // Failures within the first chunk surface here instead of mid-body
        let mut head = Vec::with_capacity(PREFETCH_SIZE);
        (&mut stream)
            .take(PREFETCH_SIZE as u64)
            .read_to_end(&mut head)
            .await
            .map_err(|e| Error::EntryRead {
                entry: raw_name.clone(),
                source: anyhow!(e),
            })?;

        tracing::debug!("Streaming {} from {:?}", raw_name, self.path);
        Ok(Box::new(Cursor::new(head).chain(stream)))
    }
}

type ExitFuture = Pin<Box<dyn Future<Output = io::Result<ExitStatus>> + Send>>;

enum DecoderState {
    Reading(Child),
    /// Stdout hit EOF; waiting for the exit status
    Exiting(ExitFuture),
    Done,
}

/// Stdout of a running decoder. Dropping it kills the process.
///
/// EOF is only reported once the decoder exited successfully; a non-zero
/// exit becomes a read error, so a truncated entry never looks complete.
struct DecoderStream {
    entry: String,
    stdout: ChildStdout,
    state: DecoderState,
}

impl AsyncRead for DecoderStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.state {
                DecoderState::Reading(_) => {
                    let before = buf.filled().len();
                    ready!(Pin::new(&mut this.stdout).poll_read(cx, buf))?;
                    if buf.filled().len() > before || buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    if let DecoderState::Reading(mut child) =
                        std::mem::replace(&mut this.state, DecoderState::Done)
                    {
                        this.state = DecoderState::Exiting(Box::pin(async move { child.wait().await }));
                    }
                }
                DecoderState::Exiting(ref mut exit) => {
                    let status = ready!(exit.as_mut().poll(cx));
                    this.state = DecoderState::Done;
                    let status = status?;
                    if !status.success() {
                        return Poll::Ready(Err(io::Error::other(format!(
                            "7z decoder for '{}' exited with {}",
                            this.entry, status
                        ))));
                    }
                    return Poll::Ready(Ok(()));
                }
                DecoderState::Done => return Poll::Ready(Ok(())),
            }
        }
    }
}

/// One entry block of a technical listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListedItem {
    pub path: String,
    pub kind: EntryKind,
}

/// Parse the output of `7z l -slt`.
///
/// Each entry is a block of `Key = Value` lines. Directory marking comes
/// from the `Attributes` flags (`D` for a directory, `A` for a file) or a
/// `Folder = +` line, depending on the 7z version.
pub(crate) fn parse_technical_listing(output: &str) -> Vec<ListedItem> {
    let mut items = Vec::new();
    let Some((_, body)) = output.split_once(ENTRY_SECTION_MARKER) else {
        return items;
    };

    let mut path: Option<String> = None;
    let mut is_dir = false;
    let mut flush = |path: &mut Option<String>, is_dir: &mut bool| {
        if let Some(p) = path.take() {
            let kind = if *is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            items.push(ListedItem { path: p, kind });
        }
        *is_dir = false;
    };

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            flush(&mut path, &mut is_dir);
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match key.trim() {
            "Path" => {
                flush(&mut path, &mut is_dir);
                path = Some(value.to_string());
            }
            "Folder" => is_dir |= value.trim() == "+",
            "Attributes" => {
                let flags = value.split_whitespace().next().unwrap_or("");
                is_dir |= flags.contains('D');
            }
            _ => {}
        }
    }
    flush(&mut path, &mut is_dir);

    items
}
