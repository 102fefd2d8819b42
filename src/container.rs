use egui::{Align, Direction, Layout, TextStyle, Ui};
use egui_extras::{Column as TableColumn, TableBuilder, TableRow};
use polars::prelude::*;
use std::{path::PathBuf, sync::Arc};
use tokio::task::spawn_blocking;

use crate::{
    Arguments, BACKORDER_RENAME, BacklogViewResult, SHIPMENT_RENAME, SheetCache, filter_forecast,
    normalize_link, prepare,
};

/// Sheet indices of the backlog workbook.
pub const BACKORDER_SHEET: usize = 0;
pub const SHIPMENT_SHEET: usize = 1;

/// The planning and lead-time workbooks are single-sheet.
pub const PLANNING_SHEET: usize = 0;
pub const LEAD_TIME_SHEET: usize = 0;

/// The three workbook paths, resolved from command-line arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSources {
    pub backlog: PathBuf,
    pub planning: PathBuf,
    pub lead_time: PathBuf,
}

impl DataSources {
    pub fn new(args: &Arguments) -> Self {
        DataSources {
            backlog: args.backlog.clone(),
            planning: args.planning.clone(),
            lead_time: args.lead_time.clone(),
        }
    }
}

/// Contains the four prepared DataFrames of one dashboard session.
///
/// Frames are wrapped in `Arc` for cheap sharing with the UI thread and are
/// never mutated after load; every user interaction recomputes derived views
/// (filtered tables, chart series) from these bases.
#[derive(Debug, Clone, Default)]
pub struct DataContainer {
    /// Shipment records (canonical schema, see `mapper.rs`).
    pub shipments: Arc<DataFrame>,
    /// Backorder records (canonical schema).
    pub backorders: Arc<DataFrame>,
    /// Forecast table (see `forecast.rs`).
    pub forecast: Arc<DataFrame>,
    /// SKU ↔ model cross-reference with ETA/Note columns.
    pub link: Arc<DataFrame>,
    /// The workbook paths this container was loaded from.
    pub sources: Arc<DataSources>,
    /// Recovered load failures, one message per failed (workbook, sheet).
    pub load_errors: Arc<Vec<String>>,
}

impl DataContainer {
    /// Loads and prepares all four tables.
    ///
    /// Workbook reads go through the shared `SheetCache` on blocking threads;
    /// a failed read contributes an empty frame plus a message in
    /// `load_errors`, so this only returns `Err` on genuine internal faults
    /// (a poisoned task or a Polars error while preparing).
    pub async fn load_data(
        sources: DataSources,
        cache: Arc<SheetCache>,
    ) -> BacklogViewResult<Self> {
        tracing::debug!("fn load_data()\nsources: {sources:#?}");

        let backorder_task = {
            let (cache, path) = (Arc::clone(&cache), sources.backlog.clone());
            spawn_blocking(move || cache.load(&path, BACKORDER_SHEET))
        };
        let shipment_task = {
            let (cache, path) = (Arc::clone(&cache), sources.backlog.clone());
            spawn_blocking(move || cache.load(&path, SHIPMENT_SHEET))
        };
        let planning_task = {
            let (cache, path) = (Arc::clone(&cache), sources.planning.clone());
            spawn_blocking(move || cache.load(&path, PLANNING_SHEET))
        };
        let link_task = {
            let (cache, path) = (Arc::clone(&cache), sources.lead_time.clone());
            spawn_blocking(move || cache.load(&path, LEAD_TIME_SHEET))
        };

        let (backorder_load, shipment_load, planning_load, link_load) =
            tokio::try_join!(backorder_task, shipment_task, planning_task, link_task)?;

        let load_errors: Vec<String> = [
            &backorder_load.error,
            &shipment_load.error,
            &planning_load.error,
            &link_load.error,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();

        let shipments = prepare(&shipment_load.frame, &SHIPMENT_RENAME)?;
        let backorders = prepare(&backorder_load.frame, &BACKORDER_RENAME)?;
        let forecast = filter_forecast(&planning_load.frame)?;
        let link = normalize_link(&link_load.frame)?;

        Ok(DataContainer {
            shipments: Arc::new(shipments),
            backorders: Arc::new(backorders),
            forecast: Arc::new(forecast),
            link: Arc::new(link),
            sources: Arc::new(sources),
            load_errors: Arc::new(load_errors),
        })
    }
}

/// Renders a DataFrame as an `egui` table: one label header row, virtualized
/// data rows, dtype-based alignment. Purely a sink for already-computed data.
pub fn render_table(ui: &mut Ui, df: &DataFrame, id_salt: &str) {
    if df.width() == 0 {
        ui.label("No data.");
        return;
    }

    // Rows rendering closure: displays the data for each row in the DataFrame.
    let analyze_rows = |mut table_row: TableRow<'_, '_>| {
        let row_index = table_row.index();

        for column in df.get_columns() {
            let dtype = column.dtype();

            // Numbers right-aligned, dates/booleans centered, text left-aligned.
            let layout = if dtype.is_float() || dtype.is_integer() {
                Layout::right_to_left(Align::Center)
            } else if dtype.is_date() || dtype.is_bool() {
                Layout::centered_and_justified(Direction::LeftToRight)
            } else {
                Layout::left_to_right(Align::Center)
            };

            let value = match column.get(row_index) {
                Ok(AnyValue::Null) => String::new(),
                Ok(AnyValue::String(s)) => s.to_string(),
                Ok(AnyValue::Float64(f)) => format_quantity(f),
                Ok(AnyValue::Float32(f)) => format_quantity(f as f64),
                Ok(av) => av.to_string(),
                Err(_) => "Error: Value not found".to_string(),
            };

            table_row.col(|ui| {
                ui.with_layout(layout.with_main_wrap(false), |ui| {
                    ui.label(value);
                });
            });
        }
    };

    let style = ui.style();
    let text_height = TextStyle::Body.resolve(style).size;
    let col_number = df.width().max(1) as f32;
    let available_space = ui.available_width()
        - col_number * style.spacing.item_spacing.x
        - style.spacing.scroll.bar_width;

    // Initial and minimal column widths, calculated based on available space and number of columns.
    let initial_col_width = available_space / col_number;
    let header_height = style.spacing.interact_size.y + 2.0 * style.spacing.item_spacing.y;
    let min_col_width = style.spacing.interact_size.x.max(initial_col_width / 4.0);

    let column = TableColumn::initial(initial_col_width)
        .at_least(min_col_width)
        .resizable(true)
        .clip(true);

    ui.push_id(id_salt, |ui| {
        TableBuilder::new(ui)
            .striped(true) // Alternate row background colors for better readability.
            .columns(column, df.width())
            .column(TableColumn::remainder()) // Add the remainder
            .auto_shrink([false, true])
            .max_scroll_height(280.0)
            .header(header_height, |mut table_row| {
                for column_name in df.get_column_names() {
                    table_row.col(|ui| {
                        ui.horizontal_centered(|ui| {
                            ui.strong(column_name.as_str());
                        });
                    });
                }
            })
            .body(|body| {
                body.rows(text_height, df.height(), analyze_rows);
            });
    });
}

/// Quantities are integral almost everywhere; print them without decimals,
/// fractional values with two.
fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//
