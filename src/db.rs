//! SQLite access layer for the corpus database

use crate::books::BookNameMap;
use crate::models::{CorpusStats, FeatureMap, FeatureValue, Hierarchy, ReferenceWord, Word};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Table not found: {0}")]
    MissingTable(String),
    #[error("Table {table} is missing column {column}")]
    MissingColumn { table: String, column: String },
    #[error("Invalid value in {table}.{column}: {value}")]
    InvalidValue {
        table: String,
        column: String,
        value: i64,
    },
}

pub const SOURCE_TABLE: &str = "source_words";
pub const REFERENCE_TABLE: &str = "reference_words";
pub const BOOK_NAMES_TABLE: &str = "book_names";

const SOURCE_COLUMNS: &[&str] = &["word_id", "book", "chapter", "verse", "word_rank", "word"];
const REFERENCE_COLUMNS: &[&str] = &[
    "node_id",
    "book",
    "chapter",
    "verse",
    "word_rank",
    "word",
    "clause_id",
    "phrase_id",
    "parent",
];
const BOOK_NAME_COLUMNS: &[&str] = &["source_code", "reference_name"];

/// Open an existing corpus database read-only.
pub fn open(db_path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Column names of `table` in declaration order.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Fail unless `table` exists with every required column. Returns all columns.
pub fn check_table(
    conn: &Connection,
    table: &str,
    required: &[&str],
) -> Result<Vec<String>, DbError> {
    if !table_exists(conn, table)? {
        return Err(DbError::MissingTable(table.to_string()));
    }
    let columns = table_columns(conn, table)?;
    for column in required {
        if !columns.iter().any(|c| c == column) {
            return Err(DbError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(columns)
}

fn select_sql(table: &str, columns: &[String], order_by: &str) -> String {
    let list = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {list} FROM \"{table}\" ORDER BY \"{order_by}\"")
}

/// Read a positive id column.
fn read_id(row: &Row, idx: usize, table: &str, column: &str) -> Result<u64, DbError> {
    let raw: i64 = row.get(idx)?;
    if raw <= 0 {
        return Err(DbError::InvalidValue {
            table: table.to_string(),
            column: column.to_string(),
            value: raw,
        });
    }
    Ok(raw as u64)
}

/// Read a nullable pointer column. Negative values are rejected; 0 is a root marker.
fn read_pointer(row: &Row, idx: usize, table: &str, column: &str) -> Result<Option<u64>, DbError> {
    let raw: Option<i64> = row.get(idx)?;
    match raw {
        Some(v) if v < 0 => Err(DbError::InvalidValue {
            table: table.to_string(),
            column: column.to_string(),
            value: v,
        }),
        other => Ok(other.map(|v| v as u64)),
    }
}

/// Extra non-null columns become features. Blobs are skipped.
fn read_features(row: &Row, columns: &[String], skip: usize) -> Result<FeatureMap, DbError> {
    let mut features = FeatureMap::new();
    for (idx, name) in columns.iter().enumerate().skip(skip) {
        let value = match row.get_ref(idx)? {
            ValueRef::Integer(v) => FeatureValue::Int(v),
            ValueRef::Real(v) => FeatureValue::Text(v.to_string()),
            ValueRef::Text(bytes) => FeatureValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Null | ValueRef::Blob(_) => continue,
        };
        features.insert(name.clone(), value);
    }
    Ok(features)
}

/// Required columns first, then the rest in table order.
fn ordered_columns(required: &[&str], all: Vec<String>) -> Vec<String> {
    let mut columns: Vec<String> = required.iter().map(|c| c.to_string()).collect();
    columns.extend(all.into_iter().filter(|c| !required.contains(&c.as_str())));
    columns
}

// ============================================================================
// Word tables
// ============================================================================

/// Load the source word table.
pub fn load_source_words(db_path: &Path) -> Result<Vec<Word>, DbError> {
    let conn = open(db_path)?;
    load_source_words_conn(&conn)
}

pub fn load_source_words_conn(conn: &Connection) -> Result<Vec<Word>, DbError> {
    let all = check_table(conn, SOURCE_TABLE, SOURCE_COLUMNS)?;
    let columns = ordered_columns(SOURCE_COLUMNS, all);

    let mut stmt = conn.prepare(&select_sql(SOURCE_TABLE, &columns, "word_id"))?;
    let mut rows = stmt.query([])?;

    let mut words = Vec::new();
    while let Some(row) = rows.next()? {
        words.push(Word {
            word_id: read_id(row, 0, SOURCE_TABLE, "word_id")?,
            book: row.get(1)?,
            chapter: row.get(2)?,
            verse: row.get(3)?,
            rank: row.get(4)?,
            surface: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            features: read_features(row, &columns, SOURCE_COLUMNS.len())?,
        });
    }

    Ok(words)
}

/// Load the reference word table with its hierarchy columns.
pub fn load_reference_words(db_path: &Path) -> Result<Vec<ReferenceWord>, DbError> {
    let conn = open(db_path)?;
    load_reference_words_conn(&conn)
}

pub fn load_reference_words_conn(conn: &Connection) -> Result<Vec<ReferenceWord>, DbError> {
    let all = check_table(conn, REFERENCE_TABLE, REFERENCE_COLUMNS)?;
    let columns = ordered_columns(REFERENCE_COLUMNS, all);

    let mut stmt = conn.prepare(&select_sql(REFERENCE_TABLE, &columns, "node_id"))?;
    let mut rows = stmt.query([])?;

    let mut words = Vec::new();
    while let Some(row) = rows.next()? {
        words.push(ReferenceWord {
            node_id: read_id(row, 0, REFERENCE_TABLE, "node_id")?,
            book: row.get(1)?,
            chapter: row.get(2)?,
            verse: row.get(3)?,
            rank: row.get(4)?,
            surface: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            hierarchy: Hierarchy {
                clause_id: read_pointer(row, 6, REFERENCE_TABLE, "clause_id")?,
                phrase_id: read_pointer(row, 7, REFERENCE_TABLE, "phrase_id")?,
                parent: read_pointer(row, 8, REFERENCE_TABLE, "parent")?,
            },
            features: read_features(row, &columns, REFERENCE_COLUMNS.len())?,
        });
    }

    Ok(words)
}

/// Load the optional `book_names` override table. `None` when the table is absent.
pub fn load_book_names(db_path: &Path) -> Result<Option<BookNameMap>, DbError> {
    let conn = open(db_path)?;
    load_book_names_conn(&conn)
}

pub fn load_book_names_conn(conn: &Connection) -> Result<Option<BookNameMap>, DbError> {
    if !table_exists(conn, BOOK_NAMES_TABLE)? {
        return Ok(None);
    }
    check_table(conn, BOOK_NAMES_TABLE, BOOK_NAME_COLUMNS)?;

    let mut stmt = conn.prepare(
        "SELECT source_code, reference_name FROM book_names ORDER BY source_code",
    )?;
    let names = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<BookNameMap, _>>()?;

    Ok(Some(names))
}

// ============================================================================
// Statistics
// ============================================================================

/// Load corpus statistics
pub fn load_corpus_stats(db_path: &Path) -> Result<CorpusStats, DbError> {
    let conn = open(db_path)?;
    load_corpus_stats_conn(&conn)
}

pub fn load_corpus_stats_conn(conn: &Connection) -> Result<CorpusStats, DbError> {
    check_table(conn, SOURCE_TABLE, SOURCE_COLUMNS)?;
    check_table(conn, REFERENCE_TABLE, REFERENCE_COLUMNS)?;

    let count = |sql: &str| -> Result<u64, DbError> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    };

    let book_name_overrides = if table_exists(conn, BOOK_NAMES_TABLE)? {
        count("SELECT COUNT(*) FROM book_names")?
    } else {
        0
    };

    Ok(CorpusStats {
        source_words: count("SELECT COUNT(*) FROM source_words")?,
        source_books: count("SELECT COUNT(DISTINCT book) FROM source_words")?,
        source_verses: count(
            "SELECT COUNT(*) FROM (SELECT DISTINCT book, chapter, verse FROM source_words)",
        )?,
        reference_words: count("SELECT COUNT(*) FROM reference_words")?,
        reference_books: count("SELECT COUNT(DISTINCT book) FROM reference_words")?,
        reference_verses: count(
            "SELECT COUNT(*) FROM (SELECT DISTINCT book, chapter, verse FROM reference_words)",
        )?,
        clauses: count("SELECT COUNT(DISTINCT clause_id) FROM reference_words")?,
        phrases: count("SELECT COUNT(DISTINCT phrase_id) FROM reference_words")?,
        book_name_overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE source_words (
                 word_id INTEGER PRIMARY KEY, book TEXT, chapter INTEGER, verse INTEGER,
                 word_rank INTEGER, word TEXT, strongs TEXT, gloss TEXT
             );
             INSERT INTO source_words VALUES
                 (2, 'JHN', 1, 1, 2, 'ἀρχῇ', 'G746', NULL),
                 (1, 'JHN', 1, 1, 1, 'Ἐν', 'G1722', 'in');
             CREATE TABLE reference_words (
                 node_id INTEGER, book TEXT, chapter INTEGER, verse INTEGER, word_rank INTEGER,
                 word TEXT, clause_id INTEGER, phrase_id INTEGER, parent INTEGER, lemma TEXT, sp TEXT
             );
             INSERT INTO reference_words VALUES
                 (500, 'John', 1, 1, 1, 'Ἐν', 900, 800, 800, 'ἐν', 'prep'),
                 (501, 'John', 1, 1, 2, 'ἀρχῇ', 900, 800, 500, 'ἀρχή', 'noun');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_load_source_words() {
        let conn = setup();
        let words = load_source_words_conn(&conn).unwrap();

        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word_id, 1);
        assert_eq!(words[0].surface, "Ἐν");
        assert_eq!(words[0].features["strongs"], FeatureValue::from("G1722"));
        assert_eq!(words[0].features["gloss"], FeatureValue::from("in"));
        assert!(!words[1].features.contains_key("gloss"));
    }

    #[test]
    fn test_load_reference_words() {
        let conn = setup();
        let words = load_reference_words_conn(&conn).unwrap();

        assert_eq!(words.len(), 2);
        assert_eq!(words[0].hierarchy.clause_id, Some(900));
        assert_eq!(words[1].hierarchy.parent, Some(500));
        assert_eq!(words[1].features["lemma"], FeatureValue::from("ἀρχή"));
        assert!(!words[1].features.contains_key("parent"));
    }

    #[test]
    fn test_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        let err = load_source_words_conn(&conn).unwrap_err();
        assert!(matches!(err, DbError::MissingTable(t) if t == "source_words"));
    }

    #[test]
    fn test_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE reference_words (
                 node_id INTEGER, book TEXT, chapter INTEGER, verse INTEGER,
                 word_rank INTEGER, word TEXT, clause_id INTEGER, parent INTEGER
             );",
        )
        .unwrap();
        let err = load_reference_words_conn(&conn).unwrap_err();
        assert!(matches!(err, DbError::MissingColumn { column, .. } if column == "phrase_id"));
    }

    #[test]
    fn test_non_positive_word_id_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE source_words (
                 word_id INTEGER, book TEXT, chapter INTEGER, verse INTEGER,
                 word_rank INTEGER, word TEXT
             );
             INSERT INTO source_words VALUES (0, 'JHN', 1, 1, 1, 'Ἐν');",
        )
        .unwrap();
        let err = load_source_words_conn(&conn).unwrap_err();
        assert!(matches!(err, DbError::InvalidValue { value: 0, .. }));
    }

    #[test]
    fn test_book_names_optional() {
        let conn = setup();
        assert!(load_book_names_conn(&conn).unwrap().is_none());

        conn.execute_batch(
            "CREATE TABLE book_names (source_code TEXT, reference_name TEXT);
             INSERT INTO book_names VALUES ('JHN', 'John'), ('PA', 'John');",
        )
        .unwrap();
        let names = load_book_names_conn(&conn).unwrap().unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names.resolve("PA"), "John");
    }

    #[test]
    fn test_corpus_stats() {
        let conn = setup();
        let stats = load_corpus_stats_conn(&conn).unwrap();

        assert_eq!(stats.source_words, 2);
        assert_eq!(stats.source_books, 1);
        assert_eq!(stats.source_verses, 1);
        assert_eq!(stats.reference_words, 2);
        assert_eq!(stats.clauses, 1);
        assert_eq!(stats.phrases, 1);
        assert_eq!(stats.book_name_overrides, 0);
    }
}
