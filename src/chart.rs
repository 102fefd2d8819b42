use egui::Ui;
use egui_plot::{Bar, BarChart, Legend, Plot};
use polars::prelude::*;

use crate::{BacklogViewResult, KEY_FIGURE_COLUMN, MODEL_COLUMN, UniqueElements};

/// One melted forecast tuple: model x quarter, with its key figure and value.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub model: String,
    pub key_figure: Option<String>,
    pub quarter: String,
    pub value: f64,
}

impl ChartRow {
    /// The bar-group label: the key figure, or the model when the planning
    /// table has no key-figure column.
    pub fn category(&self) -> &str {
        self.key_figure.as_deref().unwrap_or(&self.model)
    }
}

/// Parses a strict quarter label ("Q3 2026", case-insensitive, trimmed)
/// into its chronological sort key `(year, quarter)`.
pub fn parse_quarter(label: &str) -> Option<(i32, u8)> {
    let upper = label.trim().to_uppercase();
    let (quarter_token, year_token) = upper.split_once(' ')?;

    let quarter = quarter_token.strip_prefix('Q')?.parse::<u8>().ok()?;
    if !(1..=4).contains(&quarter) {
        return None;
    }
    if year_token.len() != 4 {
        return None;
    }
    let year = year_token.parse::<i32>().ok()?;

    Some((year, quarter))
}

/// The chart's ordering domain: quarter labels that parse as "Qn YYYY",
/// sorted chronologically. Labels that do not parse are excluded from the
/// chart even when the forecast table still shows them.
pub fn sorted_quarter_columns<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut quarters: Vec<(i32, u8, String)> = names
        .into_iter()
        .filter_map(|name| {
            parse_quarter(name).map(|(year, quarter)| (year, quarter, name.to_string()))
        })
        .collect();

    quarters.sort_by_key(|(year, quarter, _)| (*year, *quarter));
    quarters.into_iter().map(|(_, _, name)| name).collect()
}

/**
Pivots the forecast table's quarter columns into long form.

For each forecast row and each quarter column, emits one
`{model, key figure, quarter, value}` tuple. Values are coerced numeric
(blank or non-numeric cells become 0), and zero tuples are dropped entirely:
they would only render as invisible bars.
*/
pub fn to_chart_series(
    frame: &DataFrame,
    quarter_columns: &[String],
) -> BacklogViewResult<Vec<ChartRow>> {
    let mut series = Vec::new();
    if frame.height() == 0 {
        return Ok(series);
    }

    let models = frame.column(MODEL_COLUMN).ok();
    let key_figures = frame.column(KEY_FIGURE_COLUMN).ok();

    for quarter in quarter_columns {
        let Ok(values) = frame.column(quarter) else {
            continue;
        };

        for row in 0..frame.height() {
            let value = coerce_numeric(&values.get(row)?);
            if value == 0.0 {
                continue;
            }

            series.push(ChartRow {
                model: cell_text(models, row).unwrap_or_default(),
                key_figure: cell_text(key_figures, row),
                quarter: quarter.clone(),
                value,
            });
        }
    }

    tracing::debug!("to_chart_series(): {} non-zero tuple(s)", series.len());
    Ok(series)
}

/// Renders the quarterly series as a horizontal grouped bar chart:
/// one bar group per key figure (or model), one color per quarter.
pub fn render_chart(ui: &mut Ui, series: &[ChartRow], quarter_order: &[String]) {
    let mut categories: Vec<String> = series
        .iter()
        .map(|row| row.category().to_string())
        .collect();
    categories.unique();

    if categories.is_empty() || quarter_order.is_empty() {
        ui.label("Selected quarter columns have no non-zero values for current filters.");
        return;
    }

    let group_width = 0.8 / quarter_order.len() as f64;
    let mut charts: Vec<BarChart> = Vec::new();

    for (quarter_index, quarter) in quarter_order.iter().enumerate() {
        // Center the quarter bars around their category's integer position.
        let offset =
            (quarter_index as f64 - (quarter_order.len() as f64 - 1.0) / 2.0) * group_width;

        let bars: Vec<Bar> = categories
            .iter()
            .enumerate()
            .filter_map(|(category_index, category)| {
                let total: f64 = series
                    .iter()
                    .filter(|row| row.category() == category && &row.quarter == quarter)
                    .map(|row| row.value)
                    .sum();
                (total != 0.0)
                    .then(|| Bar::new(category_index as f64 + offset, total).width(group_width))
            })
            .collect();

        if !bars.is_empty() {
            charts.push(BarChart::new(quarter.clone(), bars).horizontal());
        }
    }

    let labels = categories;
    Plot::new("quarter_chart")
        .legend(Legend::default())
        .height(320.0)
        .y_axis_formatter(move |mark, _range| {
            let nearest = mark.value.round();
            if (mark.value - nearest).abs() < 0.3
                && nearest >= 0.0
                && (nearest as usize) < labels.len()
            {
                labels[nearest as usize].clone()
            } else {
                String::new()
            }
        })
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}

/// Numeric coercion for a forecast cell: blank / null / non-numeric -> 0.
fn coerce_numeric(value: &AnyValue) -> f64 {
    match value {
        AnyValue::Null => 0.0,
        AnyValue::String(s) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        AnyValue::StringOwned(s) => s.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        AnyValue::Float64(f) => *f,
        AnyValue::Float32(f) => *f as f64,
        AnyValue::Int64(i) => *i as f64,
        AnyValue::Int32(i) => *i as f64,
        AnyValue::UInt64(u) => *u as f64,
        AnyValue::UInt32(u) => *u as f64,
        _ => 0.0,
    }
}

/// One identifier cell as text; `None` when the column is absent or the cell null.
fn cell_text(column: Option<&Column>, row: usize) -> Option<String> {
    let value = column?.get(row).ok()?;
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(other.to_string()),
    }
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//

/// Run tests with:
/// cargo test -- --show-output tests_chart`
#[cfg(test)]
mod tests_chart {
    use super::*;
    use polars::df;

    #[test]
    fn test_parse_quarter_strict() {
        assert_eq!(parse_quarter("Q3 2026"), Some((2026, 3)));
        assert_eq!(parse_quarter(" q1 2025 "), Some((2025, 1)));
        assert_eq!(parse_quarter("Q5 2026"), None);
        assert_eq!(parse_quarter("Q3-2026"), None);
        assert_eq!(parse_quarter("Unique Qty"), None);
        assert_eq!(parse_quarter("Q3 26"), None);
    }

    #[test]
    fn test_quarter_ordering_is_chronological() {
        let sorted = sorted_quarter_columns(["Q3 2026", "Q1 2026", "Q4 2025"]);
        assert_eq!(sorted, ["Q4 2025", "Q1 2026", "Q3 2026"]);
    }

    #[test]
    fn test_quarter_ordering_excludes_unparseable_labels() {
        let sorted = sorted_quarter_columns(["Q1 2026", "Unique Qty", "Q9 2026"]);
        assert_eq!(sorted, ["Q1 2026"]);
    }

    #[test]
    fn test_chart_series_drops_zero_values() -> BacklogViewResult<()> {
        let frame = df!(
            "Product ST Model Num" => &["M1", "M2"],
            "Key Figure" => &["Backlog", "Backlog"],
            "Q1 2026" => &["5", "0"],
        )?;

        let series = to_chart_series(&frame, &["Q1 2026".to_string()])?;

        // Only the non-zero tuple is emitted.
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].model, "M1");
        assert_eq!(series[0].value, 5.0);
        assert!(series.iter().all(|row| row.value != 0.0));
        Ok(())
    }

    #[test]
    fn test_chart_series_blank_and_garbage_coerce_to_zero() -> BacklogViewResult<()> {
        let frame = df!(
            "Product ST Model Num" => &["M1", "M2", "M3"],
            "Key Figure" => &["Backlog", "Backlog", "Backlog"],
            "Q1 2026" => &[None, Some("n/a"), Some("1,200")],
        )?;

        let series = to_chart_series(&frame, &["Q1 2026".to_string()])?;

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].model, "M3");
        assert_eq!(series[0].value, 1200.0);
        Ok(())
    }

    #[test]
    fn test_chart_series_key_figure_fallback_to_model() -> BacklogViewResult<()> {
        let frame = df!(
            "Product ST Model Num" => &["M1"],
            "Q1 2026" => &["5"],
        )?;

        let series = to_chart_series(&frame, &["Q1 2026".to_string()])?;

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].key_figure, None);
        assert_eq!(series[0].category(), "M1");
        Ok(())
    }

    #[test]
    fn test_chart_series_missing_quarter_column_is_skipped() -> BacklogViewResult<()> {
        let frame = df!(
            "Product ST Model Num" => &["M1"],
            "Q1 2026" => &["5"],
        )?;

        let series =
            to_chart_series(&frame, &["Q1 2026".to_string(), "Q2 2026".to_string()])?;
        assert_eq!(series.len(), 1);
        Ok(())
    }
}
