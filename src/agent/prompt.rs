use serde_json::json;

use crate::db::executor::QueryResult;

/// Domain framing used when no `system_prompt_file` is configured.
pub const DEFAULT_PREAMBLE: &str = "You are a finance analyst with read access to an analytical database \
of accounts-payable transactions and the contract register. Answer questions about spend, suppliers, \
categories, directorates and contracts using the data, and say plainly when the data cannot answer.";

/// Builds the system prompt and the follow-up message carrying query results.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    summary_char_budget: usize,
}

impl PromptBuilder {
    pub fn new(preamble: &str, schema: Option<&str>, marker: &str, summary_char_budget: usize) -> Self {
        let mut system_prompt = preamble.trim().to_string();

        if let Some(schema) = schema.map(str::trim).filter(|s| !s.is_empty()) {
            system_prompt.push_str("\n\n");
            system_prompt.push_str(schema);
        }

        system_prompt.push_str("\n\n");
        system_prompt.push_str(&protocol_instructions(marker));

        Self {
            system_prompt,
            summary_char_budget,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Follow-up turn handing the results back for analysis.
    ///
    /// The JSON rendering is cut to `summary_char_budget` characters; the row count
    /// in the header is always the uncapped total.
    pub fn results_summary(&self, result: &QueryResult) -> String {
        let rendered = serde_json::to_string_pretty(&json!({
            "columns": result.columns,
            "rows": result.rows,
        }))
        .unwrap_or_else(|_| "null".to_string());

        format!(
            "Query executed. Results ({} rows):\n{}\n\nAnalyze these results.",
            result.total_rows,
            truncate_chars(&rendered, self.summary_char_budget)
        )
    }
}

/// The first `budget` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn protocol_instructions(marker: &str) -> String {
    format!(
        r#"INSTRUCTIONS FOR SQL QUERIES:
1. Write at most ONE SQL query per reply.
2. Put "{marker}" on its own line directly before the query.
3. After "{marker}" write only SQL, with no commentary inside it.
4. End the query with a semicolon.
5. Put any explanation BEFORE "{marker}", never after or inside the query.
6. The query will be executed and the results sent back to you. Do not write follow-up queries.
7. If the question needs no data, answer directly and leave out "{marker}".

CORRECT example:
To answer this, I'll total agency spending.

{marker}
SELECT SUM(amount_gbp) AS total_spend, COUNT(*) AS transaction_count
FROM ap_transactions
WHERE final_category = 'Agency';

WRONG example (two queries):
{marker}
SELECT SUM(amount_gbp) AS total_spend FROM ap_transactions WHERE final_category = 'Agency';

Let me also check the breakdown by month:
{marker}
SELECT month, SUM(amount_gbp) AS spend FROM ap_transactions WHERE final_category = 'Agency' GROUP BY month;"#
    )
}
