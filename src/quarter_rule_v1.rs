/// Quarter-column detection, permissive variant (feature `quarter-permissive`).
///
/// A planning column counts as a quarter column when its trimmed name contains
/// the letter `Q`, case-insensitive. This is intentionally over-broad (it also
/// catches names like "Unique Qty") but matches the upstream report, so the
/// table view shows exactly the columns users are used to. Chart ordering is
/// unaffected: only strict "Qn YYYY" labels enter the chart domain
/// (see `chart.rs`).
pub fn is_quarter_column(name: &str) -> bool {
    name.trim().to_uppercase().contains('Q')
}
