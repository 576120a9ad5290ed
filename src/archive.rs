use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use encoding_rs::SHIFT_JIS;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{ArchiveError, EncodingError};

// OS litter that ends up inside filing archives (Finder metadata etc.)
const EXCLUDED_DIR_PREFIX: &str = "__MACOSX";
const EXCLUDED_FILE_MARKER: &str = ".DS_Store";

/// Unpack a ZIP byte stream into `dest`, returning the relative names of the
/// extracted files (directories excluded) in archive order.
///
/// Entry names that are not valid UTF-8 are transcoded from Shift_JIS before
/// use. Any entry whose joined path would land outside `dest` fails the whole
/// extraction; the caller discards the scratch directory on every outcome, so
/// files written before a later failure never leak.
pub fn extract(bytes: &[u8], dest: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::Open)?;
    let mut file_names = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(ArchiveError::Read)?;
        let name = decode_entry_name(entry.name_raw())?;

        if is_excluded(&name) {
            debug!(entry = %name, "skipping OS-metadata entry");
            continue;
        }

        let fpath = secure_join(dest, &name)?;

        if entry.is_dir() {
            fs::create_dir_all(&fpath)?;
            continue;
        }

        if let Some(parent) = fpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&fpath)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&fpath, fs::Permissions::from_mode(mode))?;
        }

        file_names.push(name);
    }

    Ok(file_names)
}

/// Entries excluded from extraction outright.
fn is_excluded(name: &str) -> bool {
    name.starts_with(EXCLUDED_DIR_PREFIX) || name.contains(EXCLUDED_FILE_MARKER)
}

/// Decode a raw entry name: UTF-8 as-is, otherwise Shift_JIS.
fn decode_entry_name(raw: &[u8]) -> Result<String, ArchiveError> {
    if let Ok(utf8) = std::str::from_utf8(raw) {
        return Ok(utf8.to_string());
    }
    let (decoded, _, had_errors) = SHIFT_JIS.decode(raw);
    if had_errors {
        return Err(EncodingError { name: raw.to_vec() }.into());
    }
    Ok(decoded.into_owned())
}

/// Join `name` under `dest`, resolving `.`/`..` lexically. Rejects absolute
/// names and any traversal above `dest` (zip-slip defense).
fn secure_join(dest: &Path, name: &str) -> Result<PathBuf, ArchiveError> {
    let mut stack: Vec<std::ffi::OsString> = Vec::new();
    for comp in Path::new(name).components() {
        match comp {
            Component::Normal(c) => stack.push(c.to_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return Err(ArchiveError::PathEscape(dest.join(name)));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::PathEscape(dest.join(name)));
            }
        }
    }
    let mut path = dest.to_path_buf();
    for c in &stack {
        path.push(c);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, content) in entries {
                writer
                    .start_file(name.to_string(), SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn extracts_files_in_archive_order() {
        let bytes = build_zip(&[
            ("S100/PublicDoc/a.html", "<html/>"),
            ("S100/AuditDoc/b.html", "<html/>"),
        ]);
        let dest = tempfile::tempdir().unwrap();
        let names = extract(&bytes, dest.path()).unwrap();
        assert_eq!(names, vec!["S100/PublicDoc/a.html", "S100/AuditDoc/b.html"]);
        assert!(dest.path().join("S100/PublicDoc/a.html").is_file());
    }

    #[test]
    fn skips_os_metadata_entries() {
        let bytes = build_zip(&[
            ("__MACOSX/S100/._a.html", "junk"),
            ("S100/.DS_Store", "junk"),
            ("S100/a.html", "<html/>"),
        ]);
        let dest = tempfile::tempdir().unwrap();
        let names = extract(&bytes, dest.path()).unwrap();
        assert_eq!(names, vec!["S100/a.html"]);
        assert!(!dest.path().join("__MACOSX").exists());
        assert!(!dest.path().join("S100/.DS_Store").exists());
    }

    #[test]
    fn rejects_path_traversal() {
        let bytes = build_zip(&[("../evil.txt", "pwned")]);
        let outer = tempfile::tempdir().unwrap();
        let dest = outer.path().join("scratch");
        fs::create_dir(&dest).unwrap();
        let err = extract(&bytes, &dest).unwrap_err();
        assert!(matches!(err, ArchiveError::PathEscape(_)));
        assert!(!outer.path().join("evil.txt").exists());
    }

    #[test]
    fn rejects_absolute_entry_names() {
        let bytes = build_zip(&[("/etc/evil.txt", "pwned")]);
        let dest = tempfile::tempdir().unwrap();
        let err = extract(&bytes, dest.path()).unwrap_err();
        assert!(matches!(err, ArchiveError::PathEscape(_)));
    }

    #[test]
    fn decodes_shift_jis_entry_names() {
        // 有価証券報告書 in Shift_JIS
        let raw: &[u8] = &[
            0x97, 0x4c, 0x89, 0xbf, 0x8f, 0xd8, 0x8c, 0x94, 0x95, 0xf1, 0x8d,
            0x90, 0x8f, 0x91,
        ];
        assert_eq!(decode_entry_name(raw).unwrap(), "有価証券報告書");
        // valid UTF-8 passes through untouched
        assert_eq!(decode_entry_name("表紙.html".as_bytes()).unwrap(), "表紙.html");
    }

    #[test]
    fn invalid_legacy_name_is_an_encoding_error() {
        // 0xFD is outside every Shift_JIS byte range and not valid UTF-8
        let err = decode_entry_name(&[0xFD]).unwrap_err();
        assert!(matches!(err, ArchiveError::Encoding(_)));
        // a lead byte followed by an invalid trail byte is rejected too
        let err = decode_entry_name(&[0x82, 0x00]).unwrap_err();
        assert!(matches!(err, ArchiveError::Encoding(_)));
    }

    #[cfg(unix)]
    #[test]
    fn preserves_unix_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file(
                    "run.sh",
                    SimpleFileOptions::default().unix_permissions(0o755),
                )
                .unwrap();
            writer.write_all(b"#!/bin/sh\n").unwrap();
            writer.finish().unwrap();
        }
        let dest = tempfile::tempdir().unwrap();
        extract(&cursor.into_inner(), dest.path()).unwrap();
        let mode = fs::metadata(dest.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
