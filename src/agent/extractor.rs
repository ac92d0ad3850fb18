//! Recovers the single SQL statement a generator reply is meant to carry.
//!
//! The model is told to write a marker line and then one statement. It does not
//! always comply, so extraction is a fixed sequence of rules rather than a
//! parser. Nothing here checks that the result is valid or safe SQL.

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_MARKER: &str = "SQL_QUERY:";

/// Line openings that mark explanatory prose rather than SQL.
const PROSE_LEAD_INS: [&str; 5] = ["This ", "The ", "Here ", "It ", "Note:"];

/// Tokens a fenced block may open with to name its language.
const LANGUAGE_TAGS: [&str; 5] = ["sql", "postgresql", "postgres", "duckdb", "psql"];

const FENCE: &str = "```";

// A paragraph break followed by one of the prose lead-ins
static TRAILING_PROSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r?\n[ \t]*\r?\n\s*(?:This |The |Here |It |Note:)").expect("valid trailing prose pattern")
});

#[derive(Debug, Clone)]
pub struct SqlExtractor {
    marker: String,
}

impl Default for SqlExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl SqlExtractor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Returns the normalized statement, or `None` when the reply is conversational only.
    pub fn extract(&self, reply: &str) -> Option<String> {
        if self.marker.is_empty() {
            return None;
        }

        // Only the first marker counts; a later one ends the section
        let (_, after) = reply.split_once(self.marker.as_str())?;
        let section = match after.find(self.marker.as_str()) {
            Some(next) => &after[..next],
            None => after,
        };

        let candidate = if section.contains(FENCE) {
            first_fenced_block(section)?
        } else {
            leading_sql_lines(section)
        };

        normalize_statement(&candidate)
    }
}

/// Strips prose that follows a paragraph break, trims, and terminates with exactly one `;`.
///
/// Idempotent on its own output.
pub fn normalize_statement(candidate: &str) -> Option<String> {
    let truncated = match TRAILING_PROSE.find(candidate) {
        Some(m) => &candidate[..m.start()],
        None => candidate,
    };

    let statement = truncated
        .trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if statement.is_empty() {
        return None;
    }

    Some(format!("{};", statement))
}

/// Content of the first fenced block that holds more than a language tag.
fn first_fenced_block(section: &str) -> Option<String> {
    // Odd pieces sit between fences; an unclosed final fence still counts
    section
        .split(FENCE)
        .skip(1)
        .step_by(2)
        .find_map(|block| {
            let body = strip_language_tag(block.trim());
            (!body.is_empty()).then(|| body.to_string())
        })
}

fn strip_language_tag(block: &str) -> &str {
    let (first, rest) = match block.find(char::is_whitespace) {
        Some(idx) => (&block[..idx], &block[idx..]),
        None => (block, ""),
    };

    if LANGUAGE_TAGS.iter().any(|tag| first.eq_ignore_ascii_case(tag)) {
        rest.trim()
    } else {
        block
    }
}

/// Lines up to the first blank line or prose line once SQL has started.
fn leading_sql_lines(section: &str) -> String {
    let mut sql_lines: Vec<&str> = Vec::new();

    for line in section.lines() {
        let stripped = line.trim();

        if stripped.is_empty() {
            if sql_lines.is_empty() {
                continue;
            }
            break;
        }

        if is_prose(stripped) {
            // Prose ahead of the statement is skipped, prose after it ends it
            if sql_lines.is_empty() {
                continue;
            }
            break;
        }

        sql_lines.push(line);
    }

    sql_lines.join("\n").trim().to_string()
}

fn is_prose(line: &str) -> bool {
    PROSE_LEAD_INS.iter().any(|lead_in| line.starts_with(lead_in))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(reply: &str) -> Option<String> {
        SqlExtractor::default().extract(reply)
    }

    #[test]
    fn test_extraction_table() {
        let cases: &[(&str, &str, Option<&str>)] = &[
            ("no marker", "Agency spend rose 4% over the half year.", None),
            ("plain statement", "SQL_QUERY:\nSELECT 1;", Some("SELECT 1;")),
            (
                "explanation before marker is dropped",
                "To answer this, I'll query the database for agency spending.\n\nSQL_QUERY:\nSELECT SUM(amount_gbp) AS total_spend, COUNT(*) AS transaction_count\nFROM ap_transactions\nWHERE final_category = 'Agency';",
                Some("SELECT SUM(amount_gbp) AS total_spend, COUNT(*) AS transaction_count\nFROM ap_transactions\nWHERE final_category = 'Agency';"),
            ),
            ("semicolon appended", "SQL_QUERY:\nSELECT COUNT(*) FROM contracts", Some("SELECT COUNT(*) FROM contracts;")),
            ("marker with empty section", "SQL_QUERY:", None),
            ("marker with blank section", "Here you go.\nSQL_QUERY:\n\n   \n", None),
            ("marker inline with statement", "SQL_QUERY: SELECT 2;", Some("SELECT 2;")),
            (
                "blank line ends collection",
                "SQL_QUERY:\nSELECT party\nFROM ap_transactions;\n\nThat lists every supplier.",
                Some("SELECT party\nFROM ap_transactions;"),
            ),
            (
                "prose line ends collection",
                "SQL_QUERY:\nSELECT party FROM ap_transactions\nThis lists every supplier.",
                Some("SELECT party FROM ap_transactions;"),
            ),
            (
                "prose before the statement is skipped",
                "SQL_QUERY:\nThe query is:\nSELECT 3;",
                Some("SELECT 3;"),
            ),
            (
                "leading blank lines are skipped",
                "SQL_QUERY:\n\n\nSELECT 4;",
                Some("SELECT 4;"),
            ),
            (
                "only prose after marker",
                "SQL_QUERY:\nNote: no query is needed here.",
                None,
            ),
            (
                "fenced block with tag on its own line",
                "SQL_QUERY:\n```sql\nSELECT month, SUM(amount_gbp) FROM ap_transactions GROUP BY month;\n```\nThis groups by month.",
                Some("SELECT month, SUM(amount_gbp) FROM ap_transactions GROUP BY month;"),
            ),
            (
                "fenced block with tag on the same line",
                "SQL_QUERY:\n```sql SELECT directorate FROM ap_transactions```",
                Some("SELECT directorate FROM ap_transactions;"),
            ),
            (
                "fenced block without a tag",
                "SQL_QUERY:\n```\nSELECT 5\n```",
                Some("SELECT 5;"),
            ),
            (
                "uppercase tag",
                "SQL_QUERY:\n```SQL\nSELECT 6;\n```",
                Some("SELECT 6;"),
            ),
            (
                "bare tag block is skipped",
                "SQL_QUERY:\n```sql```\nignored prose\n```\nSELECT 7;\n```",
                Some("SELECT 7;"),
            ),
            (
                "unclosed fence",
                "SQL_QUERY:\n```sql\nSELECT 8;",
                Some("SELECT 8;"),
            ),
            (
                "fences with nothing inside",
                "SQL_QUERY:\n```sql\n```",
                None,
            ),
            (
                "trailing prose inside a fence is cut",
                "SQL_QUERY:\n```\nSELECT 9;\n\nThe result is a single row.\n```",
                Some("SELECT 9;"),
            ),
            (
                "column named like a tag is kept",
                "SQL_QUERY:\n```\nsqlite_version FROM pragma;\n```",
                Some("sqlite_version FROM pragma;"),
            ),
            ("doubled semicolon", "SQL_QUERY:\nSELECT 1;;", Some("SELECT 1;")),
            ("semicolon run across lines", "SQL_QUERY:\nSELECT 1 ;\n;", Some("SELECT 1;")),
            ("only semicolons", "SQL_QUERY:\n;;", None),
            (
                "crlf line endings",
                "SQL_QUERY:\r\nSELECT 10\r\nFROM contracts;\r\n\r\nThe end.",
                Some("SELECT 10\nFROM contracts;"),
            ),
        ];

        for (name, reply, expected) in cases {
            assert_eq!(
                extract(reply).as_deref(),
                *expected,
                "case '{}' failed",
                name
            );
        }
    }

    #[test]
    fn test_only_first_marker_is_honoured() {
        let reply = "SQL_QUERY:\nSELECT SUM(amount_gbp) AS total_spend\nFROM ap_transactions\nWHERE final_category = 'Agency';\nLet me also check the breakdown by month:\nSQL_QUERY:\nSELECT month, SUM(amount_gbp) AS spend FROM ap_transactions GROUP BY month;";

        let sql = extract(reply).unwrap();

        assert!(sql.starts_with("SELECT SUM(amount_gbp)"));
        assert!(!sql.contains("GROUP BY month"));
    }

    #[test]
    fn test_statement_after_second_marker_is_never_returned() {
        assert_eq!(extract("SQL_QUERY:\nSQL_QUERY:\nSELECT 2;"), None);
        assert_eq!(
            extract("SQL_QUERY:\n```sql\n```\nSQL_QUERY:\n```sql\nSELECT 2;\n```"),
            None
        );
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let once = extract("Sure.\nSQL_QUERY:\n```sql\nSELECT party, SUM(amount_gbp)\nFROM ap_transactions\nGROUP BY party\n```").unwrap();
        let twice = extract(&format!("SQL_QUERY:\n{}", once)).unwrap();

        assert_eq!(once, "SELECT party, SUM(amount_gbp)\nFROM ap_transactions\nGROUP BY party;");
        assert_eq!(twice, once);
        assert_eq!(normalize_statement(&once).as_deref(), Some(once.as_str()));

        let collapsed = extract("SQL_QUERY:\nSELECT 1 ;\n;").unwrap();
        assert_eq!(normalize_statement(&collapsed).as_deref(), Some(collapsed.as_str()));
    }

    #[test]
    fn test_custom_marker() {
        let extractor = SqlExtractor::new("QUERY>>");

        assert_eq!(extractor.marker(), "QUERY>>");
        assert_eq!(extractor.extract("QUERY>>\nSELECT 1"), Some("SELECT 1;".to_string()));
        assert_eq!(extractor.extract("SQL_QUERY:\nSELECT 1"), None);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(extract(""), None);
        assert_eq!(SqlExtractor::new("").extract("SQL_QUERY:\nSELECT 1;"), None);
        assert_eq!(normalize_statement("  \n "), None);
    }
}
