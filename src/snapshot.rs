//! Local snapshot of a repository tree.
//!
//! A GitHub zipball is extracted once into a private temporary directory.
//! Listing and fetching are then plain filesystem operations. The
//! directory is removed when the [`Snapshot`] is dropped.
//!
//! Archive entries carry a leading `<owner>-<repo>-<sha>/` directory which
//! is stripped, so snapshot paths match repository paths.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use kbsync_core::models::Entry;
use kbsync_core::source::FetchedContent;
use kbsync_core::SyncError;

/// Largest single file extracted from an archive.
const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Leading signatures of binary formats commonly committed next to notes.
const BINARY_SIGNATURES: &[&[u8]] = &[
    b"\x89PNG",
    b"\xFF\xD8\xFF",
    b"%PDF",
    b"PK\x03\x04",
];

pub struct Snapshot {
    dir: TempDir,
}

impl Snapshot {
    /// Extract `bytes` (a zip archive) into a fresh temporary directory.
    pub fn from_zipball(bytes: &[u8]) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("kbsync-snapshot-")
            .tempdir()
            .context("Failed to create snapshot directory")?;
        let written = extract_zipball(bytes, dir.path())?;
        debug!(dir = %dir.path().display(), files = written, "extracted snapshot");
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Every regular file in the snapshot, sorted by path.
    pub fn list(&self) -> Result<Vec<Entry>> {
        let root = self.root();
        let mut entries = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(Entry {
                path: to_slash_path(relative),
                modified_at: DateTime::<Utc>::from(modified),
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Read one file as text.
    ///
    /// Fails with [`SyncError::BinaryContent`] for content that is not
    /// UTF-8 or starts with a known binary signature.
    pub fn read(&self, path: &str) -> Result<FetchedContent> {
        let relative = safe_relative_path(path)?;
        let full = self.root().join(relative);

        let bytes =
            std::fs::read(&full).with_context(|| format!("error reading file: {}", path))?;
        let modified = std::fs::metadata(&full)?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if looks_binary(&bytes) {
            return Err(SyncError::BinaryContent(path.to_string()).into());
        }
        let content =
            String::from_utf8(bytes).map_err(|_| SyncError::BinaryContent(path.to_string()))?;

        Ok(FetchedContent {
            content,
            modified_at: DateTime::<Utc>::from(modified),
        })
    }
}

/// Extract a GitHub zipball into `dest`, stripping the top-level directory.
///
/// Returns the number of files written. Entries whose names would escape
/// `dest` are rejected. Entries declared larger than the size limit are
/// skipped, and an entry whose data overruns the limit fails extraction.
pub fn extract_zipball(bytes: &[u8], dest: &Path) -> Result<usize> {
    extract_zipball_with_limit(bytes, dest, MAX_ENTRY_BYTES)
}

fn extract_zipball_with_limit(bytes: &[u8], dest: &Path, max_entry_bytes: u64) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .context("Failed to open repository archive")?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = match file.enclosed_name() {
            Some(name) => name,
            None => bail!("unsafe path in repository archive: {}", file.name()),
        };
        let relative = strip_first_component(&name);
        if relative.as_os_str().is_empty() {
            continue;
        }
        // `top/../x` is enclosed as a whole but escapes once `top` is gone.
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("unsafe path in repository archive: {}", file.name());
        }
        let target = dest.join(&relative);

        if file.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if file.size() > max_entry_bytes {
            warn!(path = %relative.display(), size = file.size(), "skipping oversized archive entry");
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        let copied = std::io::copy(&mut (&mut file).take(max_entry_bytes + 1), &mut out)?;
        if copied > max_entry_bytes {
            bail!(
                "archive entry {} exceeds {} bytes",
                relative.display(),
                max_entry_bytes
            );
        }

        if let Some(modified) = file.last_modified().and_then(zip_time_to_utc) {
            out.set_modified(SystemTime::from(modified))?;
        }
        written += 1;
    }

    Ok(written)
}

fn strip_first_component(path: &Path) -> PathBuf {
    let mut components = path.components();
    components.next();
    components.as_path().to_path_buf()
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject empty, absolute and parent-relative paths.
fn safe_relative_path(path: &str) -> Result<&Path> {
    let relative = Path::new(path);
    if path.is_empty()
        || !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
    {
        bail!("invalid path: '{}'", path);
    }
    Ok(relative)
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes.len() > 8 && BINARY_SIGNATURES.iter().any(|sig| bytes.starts_with(sig))
}

/// Zip timestamps carry no zone; GitHub writes commit time in UTC.
fn zip_time_to_utc(time: zip::DateTime) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?
        .and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;

    /// A GitHub-style zipball: every file under `octo-notes-abc123/`.
    pub fn zipball(files: &[(&str, &[u8])]) -> Vec<u8> {
        raw_zip(
            &std::iter::once(("octo-notes-abc123/".to_string(), &b""[..]))
                .chain(
                    files
                        .iter()
                        .map(|(name, body)| (format!("octo-notes-abc123/{}", name), *body)),
                )
                .collect::<Vec<_>>(),
        )
    }

    /// A zip holding exactly the given entries; names ending in `/` are
    /// directories.
    pub fn raw_zip(entries: &[(String, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let mtime = zip::DateTime::from_date_and_time(2024, 3, 9, 12, 30, 0).unwrap();
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .last_modified_time(mtime);
            for (name, body) in entries {
                if name.ends_with('/') {
                    zip.add_directory(name.as_str(), options).unwrap();
                } else {
                    zip.start_file(name.as_str(), options).unwrap();
                    zip.write_all(body).unwrap();
                }
            }
            zip.finish().unwrap();
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testing::{raw_zip, zipball};

    #[test]
    fn test_extract_strips_top_directory() {
        let bytes = zipball(&[
            ("README.md", b"# readme"),
            ("docs/guide.md", b"guide #howto"),
            (".memories/ideas.md", b"idea"),
        ]);
        let snapshot = Snapshot::from_zipball(&bytes).unwrap();

        let paths: Vec<String> = snapshot.list().unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec![".memories/ideas.md", "README.md", "docs/guide.md"]);
        assert!(!snapshot.root().join("octo-notes-abc123").exists());
    }

    #[test]
    fn test_extract_preserves_mtime() {
        let bytes = zipball(&[("a.md", b"hello")]);
        let snapshot = Snapshot::from_zipball(&bytes).unwrap();
        let entries = snapshot.list().unwrap();
        assert_eq!(entries[0].modified_at.to_rfc3339(), "2024-03-09T12:30:00+00:00");

        let fetched = snapshot.read("a.md").unwrap();
        assert_eq!(fetched.content, "hello");
        assert_eq!(fetched.modified_at, entries[0].modified_at);
    }

    #[test]
    fn test_snapshot_dir_removed_on_drop() {
        let bytes = zipball(&[("a.md", b"hello")]);
        let snapshot = Snapshot::from_zipball(&bytes).unwrap();
        let root = snapshot.root().to_path_buf();
        assert!(root.exists());
        drop(snapshot);
        assert!(!root.exists());
    }

    #[test]
    fn test_read_rejects_binary() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        let bytes = zipball(&[("logo.png", png), ("bad.md", b"caf\xe9 au lait")]);
        let snapshot = Snapshot::from_zipball(&bytes).unwrap();

        for path in ["logo.png", "bad.md"] {
            let err = snapshot.read(path).unwrap_err();
            assert_eq!(
                err.downcast_ref::<SyncError>(),
                Some(&SyncError::BinaryContent(path.to_string()))
            );
        }
    }

    #[test]
    fn test_short_text_with_signature_prefix_is_text() {
        let bytes = zipball(&[("pk.md", b"PK\x03\x04")]);
        let snapshot = Snapshot::from_zipball(&bytes).unwrap();
        assert_eq!(snapshot.read("pk.md").unwrap().content, "PK\u{3}\u{4}");
    }

    #[test]
    fn test_read_rejects_escaping_paths() {
        let bytes = zipball(&[("a.md", b"hello")]);
        let snapshot = Snapshot::from_zipball(&bytes).unwrap();
        for path in ["../etc/passwd", "/etc/passwd", "docs/../../x", ""] {
            assert!(snapshot.read(path).is_err(), "{path} should be rejected");
        }
    }

    #[test]
    fn test_read_missing_file() {
        let bytes = zipball(&[("a.md", b"hello")]);
        let snapshot = Snapshot::from_zipball(&bytes).unwrap();
        let err = snapshot.read("missing.md").unwrap_err();
        assert!(err.to_string().contains("missing.md"));
        assert!(err.downcast_ref::<SyncError>().is_none());
    }

    #[test]
    fn test_invalid_archive_fails() {
        let err = Snapshot::from_zipball(b"not a zip").err().unwrap();
        assert!(err.to_string().contains("repository archive"));
    }

    #[test]
    fn test_extract_rejects_escaping_entries() {
        for name in ["top/../../evil.md", "top/../evil.md"] {
            let bytes = raw_zip(&[(name.to_string(), &b"gotcha"[..])]);
            let dest = TempDir::new().unwrap();
            let err = extract_zipball(&bytes, &dest.path().join("snap")).unwrap_err();
            assert!(err.to_string().contains("unsafe path"), "{name}: {err}");
            assert!(!dest.path().join("evil.md").exists());
        }
    }

    #[test]
    fn test_declared_oversized_entry_is_skipped() {
        let big = vec![b'a'; 64];
        let bytes = zipball(&[("big.md", &big), ("small.md", b"ok")]);
        let dest = TempDir::new().unwrap();
        let written = extract_zipball_with_limit(&bytes, dest.path(), 16).unwrap();
        assert_eq!(written, 1);
        assert!(dest.path().join("small.md").exists());
        assert!(!dest.path().join("big.md").exists());
    }

    #[test]
    fn test_entry_overrunning_its_declared_size_fails() {
        let body = vec![b'a'; 64];
        let mut bytes = raw_zip(&[("top/liar.md".to_string(), &body[..])]);

        // Understate the uncompressed size in the central directory.
        let central = bytes
            .windows(4)
            .rposition(|w| w == b"PK\x01\x02")
            .unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&10u32.to_le_bytes());

        let dest = TempDir::new().unwrap();
        let err = extract_zipball_with_limit(&bytes, dest.path(), 16).unwrap_err();
        assert!(err.to_string().contains("exceeds 16 bytes"), "{err}");
    }
}
