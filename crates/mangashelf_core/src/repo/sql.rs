//! SQL helpers shared by the SQLite repositories.

use crate::db::migrations::{current_user_version, latest_version};
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::BTreeSet;
use std::fmt::Display;
use uuid::Uuid;

/// Upper bound of ids bound into one `IN (...)` list.
///
/// Stays well below SQLite's host parameter limit.
const MAX_BIND_IDS: usize = 500;

/// Fails unless the connection carries the schema this binary was built for.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

/// Runs an id-membership query, chunking the id set when needed.
///
/// `build_sql` receives the `?, ?, ...` placeholder list for one chunk. The
/// `leading` values bind to the placeholders that precede the list.
pub(crate) fn query_by_ids<T>(
    conn: &Connection,
    ids: &[Uuid],
    leading: &[Value],
    build_sql: impl Fn(&str) -> String,
    mut parse: impl FnMut(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let unique: Vec<Uuid> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let mut items = Vec::new();

    for chunk in unique.chunks(MAX_BIND_IDS) {
        let sql = build_sql(&placeholders(chunk.len()));
        let mut bind_values = leading.to_vec();
        bind_values.extend(chunk.iter().map(|id| Value::Text(id.to_string())));

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        while let Some(row) = rows.next()? {
            items.push(parse(row)?);
        }
    }

    Ok(items)
}

/// Exactly one row is expected; zero or several is a cardinality violation.
pub(crate) fn single<T>(rows: Vec<T>, entity: &'static str, key: impl Display) -> RepoResult<T> {
    let matched = rows.len();
    match rows.into_iter().next() {
        Some(item) if matched == 1 => Ok(item),
        _ => Err(RepoError::Cardinality {
            entity,
            key: key.to_string(),
            matched,
        }),
    }
}

/// Zero or one row is expected; several is a cardinality violation.
pub(crate) fn single_or_default<T>(
    rows: Vec<T>,
    entity: &'static str,
    key: impl Display,
) -> RepoResult<Option<T>> {
    if rows.len() > 1 {
        return Err(RepoError::Cardinality {
            entity,
            key: key.to_string(),
            matched: rows.len(),
        });
    }
    Ok(rows.into_iter().next())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::{placeholders, single, single_or_default};
    use crate::repo::error::RepoError;

    #[test]
    fn placeholders_match_bind_count() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn single_rejects_empty_and_multiple() {
        let empty: Vec<u8> = Vec::new();
        assert!(matches!(
            single(empty, "series", "id=1"),
            Err(RepoError::Cardinality { matched: 0, .. })
        ));
        assert!(matches!(
            single(vec![1, 2], "series", "id=1"),
            Err(RepoError::Cardinality { matched: 2, .. })
        ));
        assert_eq!(single(vec![7], "series", "id=1").unwrap(), 7);
    }

    #[test]
    fn single_or_default_allows_empty_but_not_multiple() {
        let empty: Vec<u8> = Vec::new();
        assert_eq!(single_or_default(empty, "series", "name").unwrap(), None);
        assert_eq!(
            single_or_default(vec![3], "series", "name").unwrap(),
            Some(3)
        );
        assert!(matches!(
            single_or_default(vec![1, 2], "series", "name"),
            Err(RepoError::Cardinality { matched: 2, .. })
        ));
    }
}
