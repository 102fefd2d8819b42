use polars::prelude::*;

use crate::{BacklogViewResult, MODEL_FIELD, UniqueElements};

/// Column names of the lead-time (link) workbook.
pub const SKU_COLUMN: &str = "SKU";
pub const LINK_MODEL_COLUMN: &str = "ST MODEL";
pub const ETA_COLUMN: &str = "ETA";
pub const NOTE_COLUMN: &str = "Note";

/// The ETA display card: free text from the first matching link row.
#[derive(Debug, Clone, PartialEq)]
pub struct EtaCard {
    pub eta: String,
    pub note: String,
}

/**
Resolves a SKU query to the set of linked model identifiers.

Case-insensitive substring match of the query against every `SKU` value;
returns the trimmed `ST MODEL` values of all matching rows, deduplicated in
first-occurrence order. An empty (or whitespace-only) query yields an empty
set; it never means "match everything". Null cells never match.
*/
pub fn resolve_sku(link: &DataFrame, query: &str) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let (Some(skus), Some(models)) = (
        string_column(link, SKU_COLUMN),
        string_column(link, LINK_MODEL_COLUMN),
    ) else {
        return Vec::new();
    };

    let mut matched: Vec<String> = skus
        .iter()
        .zip(models.iter())
        .filter_map(|(sku, model)| match (sku, model) {
            (Some(sku), Some(model)) if sku.to_lowercase().contains(&needle) => {
                Some(model.trim().to_string())
            }
            _ => None,
        })
        .collect();

    matched.unique();
    tracing::debug!("resolve_sku({query:?}): {} model(s)", matched.len());
    matched
}

/// Normalizes the freshly loaded lead-time frame: trims the `ST MODEL`
/// values so they join cleanly against the record tables. A frame without
/// that column passes through unchanged.
pub fn normalize_link(frame: &DataFrame) -> BacklogViewResult<DataFrame> {
    let Some(models) = string_column(frame, LINK_MODEL_COLUMN) else {
        return Ok(frame.clone());
    };

    let trimmed: StringChunked = models.iter().map(|opt| opt.map(str::trim)).collect();

    let mut link = frame.clone();
    link.replace(
        LINK_MODEL_COLUMN,
        trimmed.with_name(LINK_MODEL_COLUMN.into()).into_series(),
    )?;
    Ok(link)
}

/// Left-joins the `SKU` column onto the shipment table by model identifier.
///
/// Unmatched models simply get a null SKU; when either side lacks its join
/// column the shipment table passes through unchanged.
pub fn attach_sku(shipments: &DataFrame, link: &DataFrame) -> BacklogViewResult<DataFrame> {
    let has_left_key = shipments.get_column_names_str().contains(&MODEL_FIELD);
    let link_names = link.get_column_names_str();
    let has_right_keys =
        link_names.contains(&LINK_MODEL_COLUMN) && link_names.contains(&SKU_COLUMN);

    if !has_left_key || !has_right_keys {
        return Ok(shipments.clone());
    }

    let key = link.select([LINK_MODEL_COLUMN, SKU_COLUMN])?;
    shipments
        .left_join(&key, [MODEL_FIELD], [LINK_MODEL_COLUMN])
        .map_err(Into::into)
}

/**
Finds the first link row matching the current queries and returns its ETA
card. A non-empty model query must match `ST MODEL`, a non-empty SKU query
must match `SKU`, both as case-insensitive substrings; a missing column skips
its predicate. Missing or null ETA/Note values fall back to display defaults.
*/
pub fn find_eta_card(link: &DataFrame, search_query: &str, sku_query: &str) -> Option<EtaCard> {
    if link.height() == 0 {
        return None;
    }

    let model_needle = search_query.trim().to_lowercase();
    let sku_needle = sku_query.trim().to_lowercase();
    let models = string_column(link, LINK_MODEL_COLUMN);
    let skus = string_column(link, SKU_COLUMN);

    let row = (0..link.height()).find(|&index| {
        let model_ok = model_needle.is_empty()
            || models.as_ref().is_none_or(|ca| {
                ca.get(index)
                    .is_some_and(|model| model.to_lowercase().contains(&model_needle))
            });
        let sku_ok = sku_needle.is_empty()
            || skus.as_ref().is_none_or(|ca| {
                ca.get(index)
                    .is_some_and(|sku| sku.to_lowercase().contains(&sku_needle))
            });
        model_ok && sku_ok
    })?;

    Some(EtaCard {
        eta: display_value(link, ETA_COLUMN, row).unwrap_or_else(|| "N/A".to_string()),
        note: display_value(link, NOTE_COLUMN, row)
            .unwrap_or_else(|| "No notes available".to_string()),
    })
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

/// One cell as display text; `None` for a missing column or a null cell.
fn display_value(frame: &DataFrame, column: &str, row: usize) -> Option<String> {
    let value = frame.column(column).ok()?.get(row).ok()?;
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        other => Some(other.to_string()),
    }
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//

/// Run tests with:
/// cargo test -- --show-output tests_link`
#[cfg(test)]
mod tests_link {
    use super::*;
    use polars::df;

    fn link_frame() -> DataFrame {
        df!(
            "SKU" => &[Some("X100-A"), Some("Y200"), Some("X100-B"), None],
            "ST MODEL" => &[" M1 ", "M2", "M1", "M9"],
            "ETA" => &[Some("3 weeks"), None, Some("5 weeks"), None],
            "Note" => &[Some("Air freight"), Some("EOL"), None, None],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_sku_empty_query_is_empty_set() {
        assert!(resolve_sku(&link_frame(), "").is_empty());
        assert!(resolve_sku(&link_frame(), "   ").is_empty());
    }

    #[test]
    fn test_resolve_sku_substring_case_insensitive() {
        // "x100" matches X100-A and X100-B; both map to M1, deduplicated and trimmed.
        assert_eq!(resolve_sku(&link_frame(), "x100"), ["M1"]);
        assert_eq!(resolve_sku(&link_frame(), "Y2"), ["M2"]);
        assert!(resolve_sku(&link_frame(), "Z999").is_empty());
    }

    #[test]
    fn test_resolve_sku_missing_column_is_empty_set() {
        let frame = df!("Other" => &["a"]).unwrap();
        assert!(resolve_sku(&frame, "x").is_empty());
    }

    #[test]
    fn test_normalize_link_trims_models() -> BacklogViewResult<()> {
        let link = normalize_link(&link_frame())?;
        assert_eq!(
            link.column(LINK_MODEL_COLUMN)?.get(0)?,
            AnyValue::String("M1")
        );

        // No ST MODEL column: pass-through.
        let other = df!("Other" => &["a"])?;
        assert!(normalize_link(&other)?.equals_missing(&other));
        Ok(())
    }

    #[test]
    fn test_attach_sku_left_join() -> BacklogViewResult<()> {
        let shipments = df!(
            "PO#" => &["PO1", "PO2"],
            "ST Model" => &["M2", "M7"],
        )?;

        let joined = attach_sku(&shipments, &link_frame())?;

        assert_eq!(joined.height(), 2);
        assert_eq!(joined.column("SKU")?.get(0)?, AnyValue::String("Y200"));
        // Unmatched model: null SKU, row preserved.
        assert_eq!(joined.column("SKU")?.get(1)?, AnyValue::Null);
        Ok(())
    }

    #[test]
    fn test_attach_sku_without_join_columns_passes_through() -> BacklogViewResult<()> {
        let shipments = df!("PO#" => &["PO1"])?;
        let joined = attach_sku(&shipments, &link_frame())?;
        assert!(joined.equals_missing(&shipments));
        Ok(())
    }

    #[test]
    fn test_find_eta_card_first_match_wins() {
        let card = find_eta_card(&link_frame(), "", "x100").unwrap();
        assert_eq!(card.eta, "3 weeks");
        assert_eq!(card.note, "Air freight");
    }

    #[test]
    fn test_find_eta_card_defaults_for_null_fields() {
        // Second X100 row: null Note.
        let card = find_eta_card(&link_frame(), "", "x100-b").unwrap();
        assert_eq!(card.eta, "5 weeks");
        assert_eq!(card.note, "No notes available");
    }

    #[test]
    fn test_find_eta_card_no_match() {
        assert_eq!(find_eta_card(&link_frame(), "does-not-exist", ""), None);
        assert_eq!(find_eta_card(&DataFrame::empty(), "", "x100"), None);
    }

    #[test]
    fn test_find_eta_card_model_query() {
        let card = find_eta_card(&link_frame(), "m2", "").unwrap();
        assert_eq!(card.eta, "N/A");
        assert_eq!(card.note, "EOL");
    }
}
