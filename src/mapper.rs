use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::BacklogViewResult;

/// Rename table for the shipment sheet: workbook header -> canonical field name.
pub const SHIPMENT_RENAME: [(&str, &str); 8] = [
    ("Cust PO Num", "PO#"),
    ("Dlv Act GI Date", "Date Ship"),
    ("ETA (Destination Arrival Date)", "ETA"),
    ("Ship To City", "Ship To City"),
    ("Ship To Country", "Ship To Country"),
    ("ST Model", "ST Model"),
    ("Delivery Shipped Qty", "Shipped Qty"),
    ("House Airway Bill Num", "Tracking Number"),
];

/// Rename table for the backorder sheet: workbook header -> canonical field name.
pub const BACKORDER_RENAME: [(&str, &str); 7] = [
    ("Cust PO Num", "PO#"),
    ("Reqt Dlv Item Date", "Req Date"),
    ("Ship To City", "Ship To City"),
    ("Ship To Country", "Ship To Country"),
    ("ST Model", "ST Model"),
    ("Order Qty", "Order Qty"),
    ("Total Backlog Qty", "Backlog Qty"),
];

/// Canonical fields parsed to `DataType::Date` (unparsable values become null).
pub const DATE_FIELDS: [&str; 3] = ["Date Ship", "ETA", "Req Date"];

/// Canonical fields kept as trimmed Strings.
pub const TEXT_FIELDS: [&str; 4] = ["PO#", "Ship To City", "Ship To Country", "ST Model"];

/// Canonical fields coerced to `Float64` (bad values become null).
pub const QUANTITY_FIELDS: [&str; 3] = ["Shipped Qty", "Order Qty", "Backlog Qty"];

/// Date formats accepted by the mapper, tried in order.
/// The loader renders Excel date cells with the first two.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y"];

/**
Maps a raw worksheet frame onto the canonical record schema.

Only source columns present in **both** the rename table and the frame are
kept; unknown or missing columns are silently dropped, never an error. Each
kept column is renamed to its canonical name and coerced:

* date fields parse to `DataType::Date`, unparsable cells -> null,
* text fields are stringified and whitespace-trimmed,
* quantity fields parse to `Float64`, bad cells -> null,
* anything else (e.g. `Tracking Number`) stays a String, untouched.

Column order follows the rename table, mirroring the source report layout.
*/
pub fn prepare(frame: &DataFrame, rename_map: &[(&str, &str)]) -> BacklogViewResult<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(rename_map.len());

    for (source, canonical) in rename_map {
        let Ok(column) = frame.column(source) else {
            continue; // Absent in this workbook revision.
        };
        let ca = as_string_chunked(column)?;

        let mapped: Column = if DATE_FIELDS.contains(canonical) {
            let days: Int32Chunked = ca
                .iter()
                .map(|opt| opt.and_then(parse_date).map(date_to_days))
                .collect();
            days.with_name((*canonical).into())
                .into_date()
                .into_series()
                .into_column()
        } else if QUANTITY_FIELDS.contains(canonical) {
            let parsed: Float64Chunked = ca
                .iter()
                .map(|opt| opt.and_then(|s| s.trim().replace(',', "").parse::<f64>().ok()))
                .collect();
            parsed
                .with_name((*canonical).into())
                .into_series()
                .into_column()
        } else {
            // Text fields and pass-through fields alike end up trimmed Strings.
            let trimmed: StringChunked = ca.iter().map(|opt| opt.map(str::trim)).collect();
            trimmed
                .with_name((*canonical).into())
                .into_series()
                .into_column()
        };

        columns.push(mapped);
    }

    tracing::debug!(
        "prepare(): kept {} of {} mapped columns",
        columns.len(),
        rename_map.len()
    );

    DataFrame::new(columns).map_err(Into::into)
}

/// Returns the column's values as a StringChunked, casting non-string source
/// values (numbers, booleans) to their String representation first.
fn as_string_chunked(column: &Column) -> BacklogViewResult<StringChunked> {
    let series = column.as_materialized_series();
    let casted = if series.dtype() == &DataType::String {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };
    Ok(casted.str()?.clone())
}

/// Parses one cell against the accepted date formats. `None` on failure,
/// never an error: bad dates become an explicit missing marker downstream.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if format.contains("%H") {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(datetime.date());
            }
        } else if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}

// Days from 0001-01-01 (chrono's CE origin) to the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Days since the Unix epoch: the physical representation of `DataType::Date`.
fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//
