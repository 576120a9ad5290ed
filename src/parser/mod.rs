pub mod breadcrumb;
pub mod dom;
pub mod heading;
pub mod normalize;
pub mod walker;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::info;
use walkdir::WalkDir;

use crate::archive;
use crate::error::{ArchiveError, MarkupError, StructureError};
use walker::StructuringContext;

/// Marker substring of audit-report annex files inside the archive.
const AUDIT_MARKER: &str = "AuditDoc";
/// Marker substring of main-filing files.
const PUBLIC_MARKER: &str = "PublicDoc";

/// One titled, breadcrumbed span of filing text. `order` is the 1-based
/// position of the section across the whole document.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub title: String,
    pub breadcrumb: String,
    pub text: String,
    pub order: i64,
}

/// Structure one filing archive into its ordered section sequence.
///
/// Extracts the archive to a scratch directory (removed on every exit path),
/// walks the markup files in filing-before-annex order against a shared
/// structuring context, then normalizes texts and assigns breadcrumbs.
/// Strictly sequential: the context is shared mutable state across the whole
/// file set.
pub fn structure_document(doc_id: &str, zip_bytes: &[u8]) -> Result<Vec<Section>, StructureError> {
    let scratch = TempDir::new().map_err(ArchiveError::Io)?;
    archive::extract(zip_bytes, scratch.path())?;

    let mut files = list_markup_files(scratch.path()).map_err(ArchiveError::Io)?;
    sort_markup_files(&mut files);
    info!(doc_id, files = files.len(), "structuring document");

    let mut ctx = StructuringContext::new();
    let mut audit_seen = false;
    for path in &files {
        let is_audit_first = !audit_seen && path.to_string_lossy().contains(AUDIT_MARKER);
        if is_audit_first {
            audit_seen = true;
        }
        let bytes = fs::read(path).map_err(MarkupError::Io)?;
        let roots = dom::parse(dom::decode(&bytes)?)?;
        walker::walk_file(&mut ctx, &roots, is_audit_first);
    }

    let mut sections = ctx.into_sections();
    normalize::normalize_sections(&mut sections);
    breadcrumb::assign(&mut sections);
    for (i, section) in sections.iter_mut().enumerate() {
        section.order = (i + 1) as i64;
    }
    Ok(sections)
}

/// All markup files under the scratch dir, in stable lexical directory order.
fn list_markup_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(".htm") || name.ends_with(".html") {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// Order files so the main filing is walked before the audit-report annex:
/// the audit marker sorts after the main-filing marker's replacement, and
/// relative order within each group is untouched.
fn sort_markup_files(files: &mut [PathBuf]) {
    files.sort_by_key(|path| {
        path.to_string_lossy()
            .replacen(AUDIT_MARKER, "ZZZ", 1)
            .replacen(PUBLIC_MARKER, "AAA", 1)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
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
    fn public_files_sort_before_audit_files() {
        let mut files = vec![
            PathBuf::from("x/AuditDoc/0000000_audit.html"),
            PathBuf::from("x/PublicDoc/0105000_body.html"),
            PathBuf::from("x/PublicDoc/0000000_header.html"),
        ];
        sort_markup_files(&mut files);
        assert_eq!(
            files,
            vec![
                PathBuf::from("x/PublicDoc/0000000_header.html"),
                PathBuf::from("x/PublicDoc/0105000_body.html"),
                PathBuf::from("x/AuditDoc/0000000_audit.html"),
            ]
        );
    }

    #[test]
    fn structures_a_three_file_filing() {
        let bytes = build_zip(&[
            (
                "S100TEST/PublicDoc/0000000_cover.html",
                "<html><head><title>表紙</title></head>\
                 <body><p>【表紙】</p><p>有価証券報告書</p></body></html>",
            ),
            (
                "S100TEST/PublicDoc/0101010_body.html",
                "<html><body><p>【事業の内容】</p><p>Ａ　Ｂ</p></body></html>",
            ),
            (
                "S100TEST/AuditDoc/0000000_report.html",
                "<html><body><p>監査の結果は適正である</p></body></html>",
            ),
        ]);

        let sections = structure_document("S100TEST", &bytes).unwrap();
        assert_eq!(sections.len(), 3);

        assert_eq!(sections[0].title, "表紙");
        assert_eq!(sections[0].order, 1);
        assert!(sections[0].text.contains("【表紙】"));
        assert_eq!(sections[0].breadcrumb, "表紙");

        assert_eq!(sections[1].title, "【事業の内容】");
        assert_eq!(sections[1].order, 2);
        // the boundary's own title text opens its section body
        assert!(sections[1].text.starts_with("【事業の内容】"));
        // the spacer between full-width alphanumerics survives normalization
        assert!(sections[1].text.contains("Ａ Ｂ"));
        // empty bracket prefix carries no hierarchy
        assert_eq!(sections[1].breadcrumb, "【事業の内容】");

        assert_eq!(sections[2].title, "監査報告書");
        assert_eq!(sections[2].order, 3);
        assert!(sections[2].text.contains("監査の結果は適正である"));
        assert_eq!(sections[2].breadcrumb, "監査報告書");
    }

    #[test]
    fn numbered_headings_get_hierarchical_breadcrumbs() {
        let bytes = build_zip(&[
            (
                "S100TEST/PublicDoc/0000000_cover.html",
                "<html><body><p>【表紙】</p></body></html>",
            ),
            (
                "S100TEST/PublicDoc/0101010_body.html",
                "<html><body>\
                 <p>第１部【企業情報】</p>\
                 <p>第１【企業の概況】</p><p>概況の本文</p>\
                 </body></html>",
            ),
        ]);
        let sections = structure_document("S100TEST", &bytes).unwrap();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].breadcrumb, "本文 > 企業情報");
        assert_eq!(sections[2].breadcrumb, "本文 > 企業情報 > 企業の概況");
        assert!(sections[2].text.contains("概況の本文"));
    }

    #[test]
    fn broken_markup_fails_the_whole_document() {
        let bytes = build_zip(&[
            (
                "S100TEST/PublicDoc/0000000_cover.html",
                "<html><body><p>【表紙】</p></body></html>",
            ),
            (
                "S100TEST/PublicDoc/0101010_body.html",
                "<html><body><!-- never closed",
            ),
        ]);
        let err = structure_document("S100TEST", &bytes).unwrap_err();
        assert!(matches!(err, StructureError::Markup(_)));
    }

    #[test]
    fn bad_archive_is_an_archive_error() {
        let err = structure_document("S100TEST", b"not a zip").unwrap_err();
        assert!(matches!(err, StructureError::Archive(_)));
    }
}
