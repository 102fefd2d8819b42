use polars::prelude::*;

use crate::{BacklogViewResult, is_quarter_column};

/// Identifier column of the planning workbook: the join key to every other table.
pub const MODEL_COLUMN: &str = "Product ST Model Num";

/// Categorical column naming what kind of quantity each planning row carries.
pub const KEY_FIGURE_COLUMN: &str = "Key Figure";

/// Allow-listed key figures; rows with any other category are dropped.
pub const KEY_FIGURES: [&str; 4] = [
    "Backlog",
    "Shipments",
    "SI UCD Final",
    "Supply Commit (Channel)",
];

/// English month abbreviations opening the names of planning month columns
/// (which look like "JAN-24 W31-26").
pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// True when the trimmed, uppercased column name starts with a month abbreviation.
pub fn is_month_column(name: &str) -> bool {
    let upper = name.trim().to_uppercase();
    MONTH_ABBREVIATIONS
        .iter()
        .any(|month| upper.starts_with(month))
}

/**
Filters the raw planning frame down to the forecast table.

Column retention is **data-driven**, discovered from the header row at load
time rather than fixed in code:

1. the identifier column (`Product ST Model Num`), if present,
2. the key-figure column (`Key Figure`), if present,
3. every month-prefixed column (`is_month_column`),
4. every quarter column (`is_quarter_column`, feature-selected rule),

in that order, deduplicated. Rows survive only when their trimmed key-figure
value is allow-listed; rows with a null key figure are dropped, and when the
key-figure column itself is absent no row can qualify, so the result keeps
the retained columns with zero rows. Identifier values are stringified and
trimmed.
*/
pub fn filter_forecast(frame: &DataFrame) -> BacklogViewResult<DataFrame> {
    if frame.width() == 0 {
        return Ok(frame.clone());
    }

    let names = frame.get_column_names_str();

    let mut keep: Vec<&str> = Vec::new();
    for base in [MODEL_COLUMN, KEY_FIGURE_COLUMN] {
        if names.contains(&base) {
            keep.push(base);
        }
    }
    for &name in &names {
        if is_month_column(name) && !keep.contains(&name) {
            keep.push(name);
        }
    }
    for &name in &names {
        if is_quarter_column(name) && !keep.contains(&name) {
            keep.push(name);
        }
    }

    tracing::debug!("filter_forecast(): keeping {} of {} columns", keep.len(), names.len());

    let mut forecast = frame.select(keep.iter().copied())?;

    match forecast.column(KEY_FIGURE_COLUMN) {
        Ok(column) => {
            let ca = string_values(column)?;
            let mask: BooleanChunked = ca
                .iter()
                .map(|opt| opt.is_some_and(|figure| KEY_FIGURES.contains(&figure.trim())))
                .collect();
            forecast = forecast.filter(&mask)?;
        }
        // No key-figure column means no row can be categorized: keep none.
        Err(_) => forecast = forecast.clear(),
    }

    if forecast.get_column_names_str().contains(&MODEL_COLUMN) {
        let trimmed: StringChunked = string_values(forecast.column(MODEL_COLUMN)?)?
            .iter()
            .map(|opt| opt.map(str::trim))
            .collect();
        forecast.replace(
            MODEL_COLUMN,
            trimmed.with_name(MODEL_COLUMN.into()).into_series(),
        )?;
    }

    Ok(forecast)
}

/// Column values as Strings, casting non-string sources first.
fn string_values(column: &Column) -> BacklogViewResult<StringChunked> {
    let series = column.as_materialized_series();
    let casted = if series.dtype() == &DataType::String {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };
    Ok(casted.str()?.clone())
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//
