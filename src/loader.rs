use calamine::{Data, Range, Reader, open_workbook_auto};
use polars::prelude::*;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use crate::{BacklogViewError, BacklogViewResult, PathExtension};

/// Workbook extensions calamine can open for us.
const SUPPORTED_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Identifies one worksheet of one workbook: the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetKey {
    pub path: PathBuf,
    pub sheet: usize,
}

/// The outcome of loading one worksheet.
///
/// Load failures are recoverable by design: a failed read yields an **empty**
/// `DataFrame` plus a human-readable message for the UI, never an error the
/// caller has to unwind on. The dashboard must always render something.
#[derive(Debug, Clone, Default)]
pub struct SheetLoad {
    /// The worksheet as a DataFrame of String columns (header row = column names).
    pub frame: DataFrame,
    /// Set when the read failed; the frame is empty in that case.
    pub error: Option<String>,
}

#[derive(Debug)]
struct CacheEntry {
    /// File modification time observed when the entry was created.
    /// `None` when the file was missing or its metadata unreadable.
    modified: Option<SystemTime>,
    load: SheetLoad,
}

/**
Value-keyed memoization store for worksheet loads.

Repeated calls with an identical `(path, sheet)` pair return the previously
computed frame without re-reading the file. An entry is invalidated when the
file modification time changes, so editing a workbook on disk is picked up on
the next load.

The inner lock is held across the actual file read: concurrent callers
requesting the same key wait for the first read instead of duplicating it.
Frames are never mutated after a successful load, so sharing clones of the
cached `SheetLoad` is safe.
*/
#[derive(Debug, Default)]
pub struct SheetCache {
    entries: Mutex<HashMap<SheetKey, CacheEntry>>,
    /// Number of actual file reads performed (cache misses), for diagnostics.
    reads: AtomicUsize,
}

impl SheetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads one worksheet, serving it from the cache when possible.
    ///
    /// ### Arguments
    /// * `path`: Workbook path (absolute or relative; used verbatim as part of the key).
    /// * `sheet`: Zero-based worksheet index.
    ///
    /// ### Returns
    /// A `SheetLoad`: the frame, or an empty frame plus a surfaced message on failure.
    pub fn load(&self, path: &Path, sheet: usize) -> SheetLoad {
        let key = SheetKey {
            path: path.to_path_buf(),
            sheet,
        };
        let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok();

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get(&key) {
            if entry.modified == modified {
                tracing::debug!("SheetCache hit: {key:?}");
                return entry.load.clone();
            }
            tracing::debug!("SheetCache entry stale (mtime changed): {key:?}");
        }

        self.reads.fetch_add(1, Ordering::Relaxed);
        let load = match read_sheet(path, sheet) {
            Ok(frame) => {
                tracing::debug!(
                    "Loaded sheet {sheet} of {path:?}: {} rows x {} cols",
                    frame.height(),
                    frame.width()
                );
                SheetLoad { frame, error: None }
            }
            Err(err) => {
                tracing::error!("Failed to load sheet {sheet} of {path:?}: {err}");
                SheetLoad {
                    frame: DataFrame::empty(),
                    error: Some(format!("Failed to load {}: {err}", path.display())),
                }
            }
        };

        entries.insert(key, CacheEntry {
            modified,
            load: load.clone(),
        });

        load
    }

    /// Number of actual file reads performed so far (one per cache miss).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Drops every cached entry, forcing fresh reads on the next load.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Reads one worksheet into a DataFrame. All cells are materialized as
/// Strings; typed coercion (dates, quantities) is the column mapper's job.
fn read_sheet(path: &Path, sheet: usize) -> BacklogViewResult<DataFrame> {
    if !path.exists() {
        return Err(BacklogViewError::FileNotFound(path.to_path_buf()));
    }

    match path.extension_as_lowercase() {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => {}
        other => {
            return Err(BacklogViewError::UnsupportedFileType(
                other.unwrap_or_else(|| "<none>".to_string()),
            ));
        }
    }

    let mut workbook = open_workbook_auto(path)?;

    // A workbook always yields multiple tables; the selector picks exactly one,
    // the sheet at the requested index.
    let range = workbook
        .worksheet_range_at(sheet)
        .ok_or_else(|| BacklogViewError::SheetNotFound {
            path: path.to_path_buf(),
            sheet,
        })??;

    range_to_frame(&range)
}

/// Converts a calamine cell range into a DataFrame: first row = headers
/// (whitespace-trimmed, deduplicated), remaining rows = String data.
fn range_to_frame(range: &Range<Data>) -> BacklogViewResult<DataFrame> {
    let mut rows = range.rows();

    let Some(header_row) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let names = unique_column_names(header_row);

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    for row in rows {
        for (index, cell) in row.iter().enumerate().take(values.len()) {
            values[index].push(cell_to_string(cell));
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .zip(values)
        .map(|(name, cells)| {
            let ca: StringChunked = cells.into_iter().collect();
            ca.with_name(name.as_str().into()).into_series().into_column()
        })
        .collect();

    DataFrame::new(columns).map_err(BacklogViewError::from)
}

/// Renders one cell as an optional String. Empty and error cells become nulls;
/// date cells become ISO strings so the mapper can parse them back to dates.
fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_float(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                naive.format("%Y-%m-%d").to_string()
            }
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Integral floats print without a trailing ".0" so quantities read naturally.
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Trims header cells and makes the resulting names unique.
/// Blank headers become "Column N"; duplicates get a "_2", "_3", ... suffix.
fn unique_column_names(header_row: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header_row
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            let trimmed = cell_to_string(cell)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("Column {}", index + 1));

            let count = seen.entry(trimmed.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                trimmed
            } else {
                format!("{trimmed}_{count}")
            }
        })
        .collect()
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//

/// Run tests with:
/// cargo test -- --show-output tests_loader`
#[cfg(test)]
mod tests_loader {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    /// Writes a two-sheet workbook: sheet 0 = backorder, sheet 1 = shipment.
    /// Header cells carry deliberate whitespace to exercise trimming.
    fn write_backlog_workbook(path: &Path) {
        let mut workbook = Workbook::new();

        let backorder = workbook.add_worksheet();
        backorder.write_string(0, 0, " Cust PO Num ").unwrap();
        backorder.write_string(0, 1, "ST Model").unwrap();
        backorder.write_string(0, 2, "Order Qty").unwrap();
        backorder.write_string(1, 0, "PO1").unwrap();
        backorder.write_string(1, 1, "M1").unwrap();
        backorder.write_number(1, 2, 10.0).unwrap();

        let shipment = workbook.add_worksheet();
        shipment.write_string(0, 0, "Cust PO Num").unwrap();
        shipment.write_string(0, 1, "Delivery Shipped Qty").unwrap();
        shipment.write_string(1, 0, "PO9").unwrap();
        shipment.write_number(1, 1, 2.5).unwrap();

        workbook.save(path).unwrap();
    }

    #[test]
    fn test_loader_trims_headers_and_stringifies_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backlog.xlsx");
        write_backlog_workbook(&path);

        let cache = SheetCache::new();
        let load = cache.load(&path, 0);

        assert!(load.error.is_none());
        assert_eq!(
            load.frame.get_column_names_str(),
            ["Cust PO Num", "ST Model", "Order Qty"]
        );
        assert_eq!(load.frame.height(), 1);

        // Integral floats print without a decimal point.
        let qty = load.frame.column("Order Qty").unwrap();
        assert_eq!(qty.get(0).unwrap(), AnyValue::String("10"));
    }

    #[test]
    fn test_loader_selects_sheet_by_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backlog.xlsx");
        write_backlog_workbook(&path);

        let cache = SheetCache::new();
        let load = cache.load(&path, 1);

        assert!(load.error.is_none());
        assert_eq!(
            load.frame.get_column_names_str(),
            ["Cust PO Num", "Delivery Shipped Qty"]
        );
        let qty = load.frame.column("Delivery Shipped Qty").unwrap();
        assert_eq!(qty.get(0).unwrap(), AnyValue::String("2.5"));
    }

    #[test]
    fn test_loader_missing_file_recovers_with_message() {
        let cache = SheetCache::new();
        let load = cache.load(Path::new("no_such_workbook.xlsx"), 0);

        assert!(load.frame.is_empty());
        let message = load.error.expect("missing file must surface a message");
        assert!(message.contains("no_such_workbook.xlsx"), "{message}");
    }

    #[test]
    fn test_loader_missing_sheet_recovers_with_message() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backlog.xlsx");
        write_backlog_workbook(&path);

        let cache = SheetCache::new();
        let load = cache.load(&path, 7);

        assert!(load.frame.is_empty());
        assert!(load.error.is_some());
    }

    #[test]
    fn test_loader_reads_file_at_most_once_per_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backlog.xlsx");
        write_backlog_workbook(&path);

        let cache = SheetCache::new();
        let first = cache.load(&path, 0);
        let second = cache.load(&path, 0);

        assert_eq!(cache.reads(), 1, "identical (path, sheet) must not re-read");
        assert!(first.frame.equals_missing(&second.frame));

        // A distinct sheet index is a distinct key.
        cache.load(&path, 1);
        assert_eq!(cache.reads(), 2);

        // Repeating any known key stays served from the cache.
        cache.load(&path, 1);
        cache.load(&path, 0);
        assert_eq!(cache.reads(), 2);
    }

    #[test]
    fn test_loader_clear_forces_reread() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backlog.xlsx");
        write_backlog_workbook(&path);

        let cache = SheetCache::new();
        cache.load(&path, 0);
        cache.clear();
        cache.load(&path, 0);

        assert_eq!(cache.reads(), 2);
    }

    #[test]
    fn test_unique_column_names_disambiguates() {
        let header = [
            Data::String("PO#".into()),
            Data::String(" PO# ".into()),
            Data::Empty,
            Data::String("City".into()),
        ];

        let names = unique_column_names(&header);
        assert_eq!(names, ["PO#", "PO#_2", "Column 3", "City"]);
    }
}
