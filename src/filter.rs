use polars::prelude::*;

use crate::{BacklogViewResult, UniqueElements};

/// Canonical field names shared by the shipment and backorder tables.
pub const PO_FIELD: &str = "PO#";
pub const MODEL_FIELD: &str = "ST Model";
pub const COUNTRY_FIELD: &str = "Ship To Country";
pub const CITY_FIELD: &str = "Ship To City";

/// Date field each table is ordered by.
pub const SHIPMENT_DATE_FIELD: &str = "Date Ship";
pub const BACKORDER_DATE_FIELD: &str = "Req Date";

/**
The shared sidebar filters, captured as one immutable value per recomputation.

The UI owns and edits a `FilterSelection`; every filtering call receives it by
reference, so there is no mutable filter state shared across the pipeline.
*/
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    /// Free-text search against PO# / ST Model.
    pub search_query: String,
    /// Free-text search against the lead-time SKU column.
    pub sku_query: String,
    /// Selected countries; empty = no country restriction.
    pub countries: Vec<String>,
    /// Selected cities; empty = no city restriction.
    pub cities: Vec<String>,
}

impl FilterSelection {
    /// True when either free-text query is non-blank.
    pub fn has_query(&self) -> bool {
        !self.search_query.trim().is_empty() || !self.sku_query.trim().is_empty()
    }
}

/**
Applies the shared filters to one record table and orders the result.

Matching policy, combined stage by stage:

1. Non-empty search query: a record matches when `PO#` OR `ST Model` contains
   the query as a case-insensitive substring; null cells never match. When
   *neither* column exists this stage is skipped entirely, so the mask stays
   all-true (a deliberate edge case of the report).
2. Non-empty resolved model set (`sku_models`): AND `ST Model` membership.
3. Non-empty country selection: AND `Ship To Country` membership.
4. Non-empty city selection: AND `Ship To City` membership.

The surviving rows, always a subset of the input, are sorted by
`date_field` descending with missing dates last, using a stable sort so tie
order is deterministic. A missing date column leaves the order untouched.
*/
pub fn apply_filters(
    frame: &DataFrame,
    selection: &FilterSelection,
    sku_models: &[String],
    date_field: &str,
) -> BacklogViewResult<DataFrame> {
    if frame.is_empty() {
        return Ok(frame.clone());
    }

    let mut mask = BooleanChunked::full("mask".into(), true, frame.height());

    let query = selection.search_query.trim().to_lowercase();
    if !query.is_empty() {
        let conditions: Vec<BooleanChunked> = [PO_FIELD, MODEL_FIELD]
            .iter()
            .filter_map(|field| contains_mask(frame, field, &query))
            .collect();

        // OR across the existing columns; no condition at all leaves the mask true.
        if let Some(combined) = conditions.into_iter().reduce(|acc, cond| &acc | &cond) {
            mask = &mask & &combined;
        }
    }

    if !sku_models.is_empty() {
        if let Some(membership) = membership_mask(frame, MODEL_FIELD, sku_models) {
            mask = &mask & &membership;
        }
    }
    if !selection.countries.is_empty() {
        if let Some(membership) = membership_mask(frame, COUNTRY_FIELD, &selection.countries) {
            mask = &mask & &membership;
        }
    }
    if !selection.cities.is_empty() {
        if let Some(membership) = membership_mask(frame, CITY_FIELD, &selection.cities) {
            mask = &mask & &membership;
        }
    }

    let filtered = frame.filter(&mask)?;

    if !filtered.get_column_names_str().contains(&date_field) {
        return Ok(filtered);
    }

    // Descending with nulls last: a missing date sorts as the minimum
    // representable date. `maintain_order` keeps ties deterministic.
    let sort_options = SortMultipleOptions::default()
        .with_maintain_order(true)
        .with_order_descending(true)
        .with_nulls_last(true);

    filtered.sort([date_field], sort_options).map_err(Into::into)
}

/// Collects the sorted unique values of one column across several frames.
/// Used to build the country/city multi-select option lists.
pub fn unique_column_values(frames: &[&DataFrame], field: &str) -> Vec<String> {
    let mut values: Vec<String> = frames
        .iter()
        .filter_map(|frame| string_column(frame, field))
        .flat_map(|ca| {
            ca.iter()
                .filter_map(|opt| opt.map(str::to_string))
                .collect::<Vec<_>>()
        })
        .collect();

    values.unique();
    values.sort();
    values
}

/// Case-insensitive substring mask for one column; `None` when absent.
fn contains_mask(frame: &DataFrame, field: &str, needle: &str) -> Option<BooleanChunked> {
    let ca = string_column(frame, field)?;
    Some(
        ca.iter()
            .map(|opt| opt.is_some_and(|value| value.to_lowercase().contains(needle)))
            .collect(),
    )
}

/// Membership mask for one column; `None` when the column is absent.
fn membership_mask(frame: &DataFrame, field: &str, allowed: &[String]) -> Option<BooleanChunked> {
    let ca = string_column(frame, field)?;
    Some(
        ca.iter()
            .map(|opt| opt.is_some_and(|value| allowed.iter().any(|item| item == value)))
            .collect(),
    )
}

/// A column's values as Strings, or `None` when absent / not castable.
fn string_column(frame: &DataFrame, name: &str) -> Option<StringChunked> {
    let series = frame.column(name).ok()?.as_materialized_series();
    let casted = if series.dtype() == &DataType::String {
        series.clone()
    } else {
        series.cast(&DataType::String).ok()?
    };
    casted.str().ok().cloned()
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//

/// Run tests with:
/// cargo test -- --show-output tests_filter`
#[cfg(test)]
mod tests_filter {
    use super::*;
    use crate::{BACKORDER_RENAME, prepare};
    use polars::df;

    fn selection_with_query(query: &str) -> FilterSelection {
        FilterSelection {
            search_query: query.to_string(),
            ..Default::default()
        }
    }

    fn shipment_frame() -> DataFrame {
        let raw = df!(
            "Cust PO Num" => &["PO1", "PO2", "PO3"],
            "Reqt Dlv Item Date" => &[Some("2024-05-01"), None, Some("2024-06-01")],
            "Ship To City" => &["Austin", "Berlin", "Austin"],
            "Ship To Country" => &["US", "DE", "US"],
            "ST Model" => &["M1", "M2", "M3"],
        )
        .unwrap();
        prepare(&raw, &BACKORDER_RENAME).unwrap()
    }

    #[test]
    fn test_filter_result_is_subset_sorted_by_date_desc_nulls_last() -> BacklogViewResult<()> {
        let frame = shipment_frame();
        let filtered = apply_filters(
            &frame,
            &FilterSelection::default(),
            &[],
            BACKORDER_DATE_FIELD,
        )?;

        // No query: all rows survive, reordered by date descending, null last.
        assert_eq!(filtered.height(), frame.height());
        let po = filtered.column(PO_FIELD)?;
        assert_eq!(po.get(0)?, AnyValue::String("PO3")); // 2024-06-01
        assert_eq!(po.get(1)?, AnyValue::String("PO1")); // 2024-05-01
        assert_eq!(po.get(2)?, AnyValue::String("PO2")); // missing date
        Ok(())
    }

    #[test]
    fn test_filter_search_matches_po_or_model() -> BacklogViewResult<()> {
        let frame = shipment_frame();

        let by_po = apply_filters(
            &frame,
            &selection_with_query("po2"),
            &[],
            BACKORDER_DATE_FIELD,
        )?;
        assert_eq!(by_po.height(), 1);
        assert_eq!(by_po.column(MODEL_FIELD)?.get(0)?, AnyValue::String("M2"));

        let by_model = apply_filters(
            &frame,
            &selection_with_query("m3"),
            &[],
            BACKORDER_DATE_FIELD,
        )?;
        assert_eq!(by_model.height(), 1);
        assert_eq!(by_model.column(PO_FIELD)?.get(0)?, AnyValue::String("PO3"));
        Ok(())
    }

    #[test]
    fn test_filter_search_with_neither_column_present_keeps_all_rows() -> BacklogViewResult<()> {
        // Mask defaults to true only when neither PO# nor ST Model exists.
        let frame = df!("Other" => &["a", "b"])?;
        let filtered = apply_filters(
            &frame,
            &selection_with_query("zzz"),
            &[],
            BACKORDER_DATE_FIELD,
        )?;
        assert_eq!(filtered.height(), 2);
        Ok(())
    }

    #[test]
    fn test_filter_sku_models_and_selections_combine_with_and() -> BacklogViewResult<()> {
        let frame = shipment_frame();
        let selection = FilterSelection {
            countries: vec!["US".to_string()],
            ..Default::default()
        };
        let sku_models = vec!["M1".to_string(), "M2".to_string()];

        // M2 is in the SKU set but not in a selected country; only M1 survives.
        let filtered = apply_filters(&frame, &selection, &sku_models, BACKORDER_DATE_FIELD)?;
        assert_eq!(filtered.height(), 1);
        assert_eq!(filtered.column(MODEL_FIELD)?.get(0)?, AnyValue::String("M1"));
        Ok(())
    }

    #[test]
    fn test_filter_city_selection() -> BacklogViewResult<()> {
        let frame = shipment_frame();
        let selection = FilterSelection {
            cities: vec!["Berlin".to_string()],
            ..Default::default()
        };

        let filtered = apply_filters(&frame, &selection, &[], BACKORDER_DATE_FIELD)?;
        assert_eq!(filtered.height(), 1);
        assert_eq!(filtered.column(PO_FIELD)?.get(0)?, AnyValue::String("PO2"));
        Ok(())
    }

    #[test]
    fn test_filter_missing_date_column_keeps_order() -> BacklogViewResult<()> {
        let frame = df!(
            "PO#" => &["PO9", "PO8"],
            "ST Model" => &["M9", "M8"],
        )?;

        let filtered =
            apply_filters(&frame, &FilterSelection::default(), &[], "Date Ship")?;
        assert_eq!(filtered.column("PO#")?.get(0)?, AnyValue::String("PO9"));
        Ok(())
    }

    #[test]
    fn test_filter_end_to_end_backorder_scenario() -> BacklogViewResult<()> {
        // Loading a backorder sheet with one row and querying "po1" must yield
        // exactly one record with trimmed PO#, other fields passed through.
        let raw = df!(
            "Cust PO Num" => &[" PO1 "],
            "Ship To City" => &["Austin"],
            "Ship To Country" => &["US"],
            "ST Model" => &["M1"],
            "Order Qty" => &["10"],
            "Total Backlog Qty" => &["3"],
        )?;
        let records = prepare(&raw, &BACKORDER_RENAME)?;

        let filtered = apply_filters(
            &records,
            &selection_with_query("po1"),
            &[],
            BACKORDER_DATE_FIELD,
        )?;

        assert_eq!(filtered.height(), 1);
        assert_eq!(filtered.column(PO_FIELD)?.get(0)?, AnyValue::String("PO1"));
        assert_eq!(filtered.column(CITY_FIELD)?.get(0)?, AnyValue::String("Austin"));
        assert_eq!(filtered.column(COUNTRY_FIELD)?.get(0)?, AnyValue::String("US"));
        assert_eq!(filtered.column(MODEL_FIELD)?.get(0)?, AnyValue::String("M1"));
        assert_eq!(
            filtered.column("Order Qty")?.get(0)?,
            AnyValue::Float64(10.0)
        );
        assert_eq!(
            filtered.column("Backlog Qty")?.get(0)?,
            AnyValue::Float64(3.0)
        );
        Ok(())
    }

    #[test]
    fn test_unique_column_values_union_sorted() -> BacklogViewResult<()> {
        let a = df!("Ship To Country" => &["US", "DE", "US"])?;
        let b = df!("Ship To Country" => &["SG", "DE"])?;

        let values = unique_column_values(&[&a, &b], COUNTRY_FIELD);
        assert_eq!(values, ["DE", "SG", "US"]);
        Ok(())
    }
}
