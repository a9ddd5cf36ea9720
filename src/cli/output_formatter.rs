use colored::*;
use serde_json::Value;

use crate::cli::cli_args::OutputFormat;
use crate::utils::error::FlatrestError;
use crate::utils::types::{QueryResult, Row};

/// Formats query results for CLI output
pub struct OutputFormatter;

impl OutputFormatter {
    /// Format query results according to the specified format
    pub fn format_result(result: &QueryResult, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(result),
            OutputFormat::Json => Self::format_json(result),
        }
    }

    /// Column names in first-seen order across all rows
    fn collect_columns(rows: &[&Row]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Format results as a colored table
    fn format_table(result: &QueryResult) -> String {
        let rows = result.data_rows();
        let count_line = result
            .count
            .map(|count| format!("{} {}\n", "Count:".bold(), count.to_string().green().bold()));

        if rows.is_empty() {
            let mut output = format!("{}\n", "No results found.".dimmed());
            if let Some(line) = count_line {
                output.push_str(&line);
            }
            return output;
        }

        let columns = Self::collect_columns(&rows);
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).map(Self::value_to_string).unwrap_or_default())
                    .collect()
            })
            .collect();

        let mut col_widths: Vec<usize> = columns.iter().map(|c| c.chars().count().max(4)).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                col_widths[i] = col_widths[i].max(cell.chars().count());
            }
        }

        let mut output = String::new();
        output.push_str(&Self::format_table_separator(&col_widths, true));
        output.push('|');
        for (i, column) in columns.iter().enumerate() {
            output.push_str(&format!(" {} |", Self::pad(column.bold().cyan(), column, col_widths[i])));
        }
        output.push('\n');
        output.push_str(&Self::format_table_separator(&col_widths, false));

        for (row, row_cells) in rows.iter().zip(cells.iter()) {
            output.push('|');
            for (i, column) in columns.iter().enumerate() {
                let plain = &row_cells[i];
                let colored = match row.get(column) {
                    Some(value) => Self::format_value_colored(value, plain),
                    None => plain.normal(),
                };
                output.push_str(&format!(" {} |", Self::pad(colored, plain, col_widths[i])));
            }
            output.push('\n');
        }

        output.push_str(&Self::format_table_separator(&col_widths, true));
        output.push_str(&format!(
            "\n{} {}\n",
            rows.len().to_string().green().bold(),
            if rows.len() == 1 { "row" } else { "rows" }
        ));
        if let Some(line) = count_line {
            output.push_str(&line);
        }

        output
    }

    /// Pad using the uncolored width, since escape codes have no width
    fn pad(colored: ColoredString, plain: &str, width: usize) -> String {
        let padding = width.saturating_sub(plain.chars().count());
        format!("{}{}", colored, " ".repeat(padding))
    }

    /// Format table separator line
    fn format_table_separator(col_widths: &[usize], is_border: bool) -> String {
        let edge = if is_border { '+' } else { '|' };
        let mut separator = String::new();

        separator.push(edge);
        for &width in col_widths {
            separator.push_str(&"-".repeat(width + 2));
            separator.push(edge);
        }

        separator.push('\n');
        separator
    }

    /// Format results as `{"data": ..., "count": ...}`
    fn format_json(result: &QueryResult) -> String {
        serde_json::to_string_pretty(&result.to_json()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Convert a JSON value to a display string
    fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => "NULL".to_string(),
            other => other.to_string(),
        }
    }

    fn format_value_colored(value: &Value, plain: &str) -> ColoredString {
        match value {
            Value::String(_) => plain.normal(),
            Value::Number(_) => plain.blue(),
            Value::Bool(true) => plain.green(),
            Value::Bool(false) => plain.red(),
            Value::Array(_) | Value::Object(_) => plain.magenta(),
            Value::Null => plain.dimmed(),
        }
    }

    /// Format error message for CLI display
    pub fn format_error(error: &FlatrestError) -> String {
        format!("{} {}", "Error:".red().bold(), error.to_string().red())
    }

    /// Format info message for CLI display
    pub fn format_info(message: &str) -> String {
        format!("{} {}", "Info:".blue().bold(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::ResultData;
    use serde_json::json;

    fn result(rows: Value) -> QueryResult {
        let rows = rows
            .as_array()
            .expect("array")
            .iter()
            .map(|r| r.as_object().cloned().expect("object"))
            .collect();
        QueryResult::rows(rows)
    }

    #[test]
    fn test_format_table_lists_union_of_columns() {
        colored::control::set_override(false);
        let output = OutputFormatter::format_result(
            &result(json!([{"id": "a", "status": "pending"}, {"id": "b", "score": 3}])),
            &OutputFormat::Table,
        );

        assert!(output.contains("| id   | status  | score |"));
        assert!(output.contains("| a    | pending |       |"));
        assert!(output.contains("2 rows"));
    }

    #[test]
    fn test_format_table_empty_with_count() {
        colored::control::set_override(false);
        let empty = QueryResult {
            data: ResultData::Null,
            count: Some(7),
        };
        let output = OutputFormatter::format_result(&empty, &OutputFormat::Table);
        assert!(output.contains("No results found."));
        assert!(output.contains("Count: 7"));
    }

    #[test]
    fn test_format_json() {
        let output = OutputFormatter::format_result(
            &result(json!([{"id": "a"}])).with_count(Some(1)),
            &OutputFormat::Json,
        );
        let parsed: Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(parsed, json!({"data": [{"id": "a"}], "count": 1}));
    }
}
