//! Text helpers for captured SQL.
//!
//! Table extraction here is a heuristic over keywords, not a SQL parser.
//! Known false negatives:
//!
//! - quoted identifiers (`"Appointments"`, `` `appointments` ``, `[appointments]`)
//!   are not matched;
//! - CTE names after `WITH` are not reported, and a CTE referenced in `FROM`
//!   is reported as if it were a table;
//! - tables reached only through a parenthesized subquery are found only when
//!   the subquery itself contains `FROM`/`JOIN`;
//! - comma-separated `FROM a, b` reports only `a`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static TABLE_REF: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(FROM|JOIN|INTO|UPDATE)\s+([A-Za-z_][A-Za-z0-9_$]*(?:\.[A-Za-z_][A-Za-z0-9_$]*)?)(\s*\()?",
    )
    .ok()
});

/// Returns the table names following `FROM`, `JOIN`, `INTO` and `UPDATE`.
///
/// Set-returning function calls (`FROM generate_series(..)`) are skipped.
/// Names are lowercased and de-duplicated in first-seen order. Schema
/// prefixes are kept (`public.appointments`).
#[must_use]
pub fn extract_tables(sql: &str) -> Vec<String> {
    let Some(re) = TABLE_REF.as_ref() else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    re.captures_iter(sql)
        .filter(|caps| !is_function_call(caps))
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|name| !is_keyword(name))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// `FROM f(..)` and `JOIN f(..)` read from a function; `INTO t (..)` is a
/// column list.
fn is_function_call(caps: &regex::Captures<'_>) -> bool {
    let reads = caps
        .get(1)
        .is_some_and(|k| matches!(k.as_str().to_ascii_uppercase().as_str(), "FROM" | "JOIN"));
    reads && caps.get(3).is_some()
}

/// Returns `true` if any table in `tables` is `table`, with or without a
/// schema prefix.
#[must_use]
pub fn references_table(tables: &[String], table: &str) -> bool {
    tables.iter().any(|t| {
        let bare = t.rsplit('.').next().unwrap_or(t);
        bare.eq_ignore_ascii_case(table)
    })
}

/// Truncates `text` to at most `max_chars` characters, on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text.get(..byte_idx).unwrap_or(text).to_string(),
        None => text.to_string(),
    }
}

/// Words that can follow the matched keywords without naming a table
/// (`FROM ONLY t`, `FROM LATERAL (...)`, `FOR UPDATE SKIP LOCKED`).
fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "only" | "lateral" | "select" | "skip" | "nowait" | "of" | "set"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_and_join_targets() {
        let sql = "SELECT a.id FROM appointments a \
                   INNER JOIN doctors d ON d.id = a.doctor_id \
                   LEFT JOIN patients p ON p.id = a.patient_id";
        assert_eq!(
            extract_tables(sql),
            vec!["appointments", "doctors", "patients"]
        );
    }

    #[test]
    fn extracts_write_targets() {
        assert_eq!(
            extract_tables("INSERT INTO query_logs (command_text) VALUES ($1)"),
            vec!["query_logs"]
        );
        assert_eq!(
            extract_tables("update Appointments set status = $1"),
            vec!["appointments"]
        );
        assert_eq!(
            extract_tables("DELETE FROM change_logs WHERE timestamp < $1"),
            vec!["change_logs"]
        );
    }

    #[test]
    fn keeps_schema_prefix_and_dedupes() {
        let sql = "SELECT * FROM public.appointments JOIN public.appointments x ON true";
        assert_eq!(extract_tables(sql), vec!["public.appointments"]);
    }

    #[test]
    fn skips_locking_clause_keywords() {
        let sql = "SELECT * FROM slots WHERE free FOR UPDATE SKIP LOCKED";
        assert_eq!(extract_tables(sql), vec!["slots"]);
    }

    #[test]
    fn skips_set_returning_functions() {
        let sql = "INSERT INTO change_logs (user_id) \
                   SELECT user_id FROM jsonb_populate_recordset(NULL::change_logs, $1) AS r";
        assert_eq!(extract_tables(sql), vec!["change_logs"]);
        assert_eq!(
            extract_tables("SELECT * FROM generate_series (1, 3) JOIN slots ON true"),
            vec!["slots"]
        );
    }

    #[test]
    fn quoted_identifiers_are_a_known_miss() {
        assert!(extract_tables(r#"SELECT * FROM "Appointments""#).is_empty());
    }

    #[test]
    fn references_table_ignores_schema() {
        let tables = vec!["audit.query_logs".to_string()];
        assert!(references_table(&tables, "query_logs"));
        assert!(!references_table(&tables, "change_logs"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }
}
