//! Trial balance report shape and normalization.
//!
//! Only the parts of the QuickBooks report JSON that the import needs are
//! modelled. `Rows.Row` is sometimes a single object instead of a list, and
//! sections nest further `Rows`; both are handled here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::qbo::amount::parse_amount;

/// The `TrialBalance` report as returned by the reports API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrialBalanceReport {
    /// Report rows.
    #[serde(rename = "Rows", default)]
    pub rows: Option<ReportRows>,
}

/// A `Rows` container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportRows {
    /// The rows, normalized to a list.
    #[serde(rename = "Row", default, deserialize_with = "one_or_many")]
    pub row: Vec<ReportRow>,
}

/// A single report row: either a data row or a section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportRow {
    /// Cells of a data row.
    #[serde(rename = "ColData", default)]
    pub col_data: Vec<ColData>,
    /// Nested rows of a section.
    #[serde(rename = "Rows", default)]
    pub rows: Option<ReportRows>,
    /// Row type (`Data` or `Section`).
    #[serde(rename = "type", default)]
    pub row_type: Option<String>,
    /// Account reference some report variants attach to the row.
    #[serde(default)]
    pub account: Option<AccountRef>,
}

/// A report cell.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ColData {
    /// Display value.
    #[serde(default)]
    pub value: String,
    /// Provider id, present on account cells.
    #[serde(default)]
    pub id: Option<String>,
}

/// Account reference attached to a row.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccountRef {
    /// Provider account id.
    #[serde(default)]
    pub id: Option<String>,
    /// Provider account classification, e.g. `Bank`.
    #[serde(rename = "accountType", default)]
    pub account_type: Option<String>,
}

/// Longest account type the accounts table stores.
pub const ACCOUNT_TYPE_MAX_LEN: usize = 50;

/// One trial balance line ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine {
    /// Provider account id, when the report carries one.
    pub external_account_id: Option<String>,
    /// Account display name.
    pub account_name: String,
    /// Provider account classification.
    pub account_type: Option<String>,
    /// Signed amount.
    pub amount: Decimal,
}

impl NormalizedLine {
    /// Key used to reuse cached accounts within one import.
    #[must_use]
    pub fn account_key(&self) -> &str {
        self.external_account_id
            .as_deref()
            .unwrap_or(&self.account_name)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<OneOrMany<T>> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}

/// Flattens the report into lines.
///
/// Skips rows with fewer than two cells, rows without an account name and
/// total rows (name starting with `total`, any case). The amount is the last
/// cell.
#[must_use]
pub fn normalize(report: &TrialBalanceReport) -> Vec<NormalizedLine> {
    let mut lines = Vec::new();
    if let Some(rows) = &report.rows {
        collect(rows, &mut lines);
    }
    lines
}

fn collect(rows: &ReportRows, lines: &mut Vec<NormalizedLine>) {
    for row in &rows.row {
        if let Some(nested) = &row.rows {
            collect(nested, lines);
        }
        if let Some(line) = normalize_row(row) {
            lines.push(line);
        }
    }
}

fn normalize_row(row: &ReportRow) -> Option<NormalizedLine> {
    let [first, .., last] = row.col_data.as_slice() else {
        return None;
    };
    let account_name = first.value.trim();
    if account_name.is_empty() || account_name.to_lowercase().starts_with("total") {
        return None;
    }

    let external_account_id = first
        .id
        .clone()
        .or_else(|| row.account.as_ref().and_then(|a| a.id.clone()))
        .filter(|id| !id.is_empty());

    let account_type = row
        .account
        .as_ref()
        .and_then(|a| a.account_type.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.chars().take(ACCOUNT_TYPE_MAX_LEN).collect());

    Some(NormalizedLine {
        external_account_id,
        account_name: account_name.to_string(),
        account_type,
        amount: parse_amount(&last.value),
    })
}
