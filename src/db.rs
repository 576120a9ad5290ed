use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::parser::Section;

const DB_PATH: &str = "data/edinet.sqlite";

pub fn connect() -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

#[cfg(test)]
pub fn connect_in_memory() -> Result<Connection> {
    Ok(Connection::open_in_memory()?)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            date          TEXT NOT NULL,
            seq_number    INTEGER NOT NULL,
            doc_id        TEXT NOT NULL,
            description   TEXT,
            section_count INTEGER NOT NULL DEFAULT 0,
            processed_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (date, seq_number)
        );
        CREATE INDEX IF NOT EXISTS idx_documents_doc_id ON documents(doc_id);

        CREATE TABLE IF NOT EXISTS document_texts (
            doc_id     TEXT NOT NULL,
            seq        INTEGER NOT NULL,
            title      TEXT NOT NULL,
            breadcrumb TEXT NOT NULL,
            content    TEXT NOT NULL,
            PRIMARY KEY (doc_id, seq)
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS section_search USING fts5(
            doc_id UNINDEXED,
            seq UNINDEXED,
            breadcrumb,
            content
        );
        ",
    )?;
    Ok(())
}

/// Whether a document's sections are already stored.
pub fn is_processed(conn: &Connection, doc_id: &str) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM document_texts WHERE doc_id = ?1 LIMIT 1",
            [doc_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

/// Save one structured document: upsert the batch-keyed metadata row, then
/// insert the section texts unless the document is already stored (saves are
/// idempotent per doc_id, matching the core's per-sequence-number contract).
/// Returns false when the texts were already present.
pub fn save_document(
    conn: &Connection,
    date: &str,
    seq_number: i64,
    doc_id: &str,
    description: Option<&str>,
    sections: &[Section],
) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO documents (date, seq_number, doc_id, description, section_count)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(date, seq_number) DO UPDATE SET
             doc_id = excluded.doc_id,
             description = excluded.description,
             section_count = excluded.section_count,
             processed_at = datetime('now')",
        rusqlite::params![date, seq_number, doc_id, description, sections.len() as i64],
    )?;

    if is_processed(&tx, doc_id)? {
        tx.commit()?;
        return Ok(false);
    }

    {
        let mut text_stmt = tx.prepare(
            "INSERT INTO document_texts (doc_id, seq, title, breadcrumb, content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut fts_stmt = tx.prepare(
            "INSERT INTO section_search (doc_id, seq, breadcrumb, content)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for section in sections {
            text_stmt.execute(rusqlite::params![
                doc_id,
                section.order,
                section.title,
                section.breadcrumb,
                section.text,
            ])?;
            fts_stmt.execute(rusqlite::params![
                doc_id,
                section.order,
                section.breadcrumb,
                section.text,
            ])?;
        }
    }

    tx.commit()?;
    Ok(true)
}

/// Stored sections for one document, in sequence order.
pub fn fetch_sections(conn: &Connection, doc_id: &str) -> Result<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT seq, title, breadcrumb, content
         FROM document_texts
         WHERE doc_id = ?1
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([doc_id], |row| {
            Ok(Section {
                order: row.get(0)?,
                title: row.get(1)?,
                breadcrumb: row.get(2)?,
                text: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct SearchHit {
    pub doc_id: String,
    pub seq: i64,
    pub breadcrumb: String,
    pub snippet: String,
}

/// Full-text match over breadcrumb + section content, best hits first.
pub fn search_sections(conn: &Connection, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, seq, breadcrumb,
                snippet(section_search, 3, '[', ']', '…', 16)
         FROM section_search
         WHERE section_search MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![query, limit as i64], |row| {
            Ok(SearchHit {
                doc_id: row.get(0)?,
                seq: row.get(1)?,
                breadcrumb: row.get(2)?,
                snippet: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct Stats {
    pub documents: i64,
    pub sections: i64,
    pub dates: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let documents = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
    let sections = conn.query_row("SELECT COUNT(*) FROM document_texts", [], |row| row.get(0))?;
    let dates = conn.query_row("SELECT COUNT(DISTINCT date) FROM documents", [], |row| {
        row.get(0)
    })?;
    Ok(Stats {
        documents,
        sections,
        dates,
    })
}
