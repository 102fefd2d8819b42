use regex::Regex;
use std::sync::LazyLock;

/// Strict "Qn YYYY" column names, e.g. "Q3 2026".
static QUARTER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Q[1-4] \d{4}$").expect("valid quarter regex"));

/// Quarter-column detection, strict variant (feature `quarter-strict`).
///
/// Only trimmed, uppercased names matching `Qn YYYY` qualify, so columns like
/// "Unique Qty" no longer leak into the forecast table.
pub fn is_quarter_column(name: &str) -> bool {
    QUARTER_NAME.is_match(&name.trim().to_uppercase())
}
