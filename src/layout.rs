use crate::{
    BACKORDER_DATE_FIELD, BacklogViewError, BacklogViewResult, CITY_FIELD, COUNTRY_FIELD,
    DataContainer, DataSources,
    Error, FilterSelection, MODEL_COLUMN, MyStyle, Notification, SHIPMENT_DATE_FIELD,
    SheetCache, apply_filters, attach_sku, find_eta_card, render_chart, render_table, resolve_sku,
    sorted_quarter_columns, to_chart_series, unique_column_values,
};

use egui::{
    CentralPanel, Color32, Context, Direction, FontId, Frame, Grid, Hyperlink, Layout, RichText,
    ScrollArea, SidePanel, Stroke, TopBottomPanel, ViewportCommand, menu, style::Visuals,
    warn_if_debug_build, widgets,
};
use polars::prelude::*;
use std::sync::Arc;
use tokio::sync::oneshot::{self, Receiver, error::TryRecvError};
use tracing::error;

/// Type alias for a Result with a `DataContainer`.
pub type ContainerResult = BacklogViewResult<DataContainer>;
/// Type alias for a boxed, dynamically dispatched Future that returns a `ContainerResult`.
pub type DataFuture = Box<dyn Future<Output = ContainerResult> + Unpin + Send + 'static>;

/// The main application struct for Backlog View.
pub struct BacklogViewApp {
    /// The `DataContainer` holds the four prepared tables.
    /// Using Option<Arc> it is more efficient for sharing data across the UI.
    pub data_container: Option<Arc<DataContainer>>,
    /// The sidebar filter state (queries and country/city selections).
    pub selection: FilterSelection,
    /// The workbook paths this session reads from.
    pub sources: DataSources,
    /// Worksheet cache shared with every load task.
    pub cache: Arc<SheetCache>,
    /// Optional Notification window for displaying errors.
    pub notification: Option<Box<dyn Notification>>,

    /// Tokio runtime for asynchronous operations (workbook loading).
    runtime: tokio::runtime::Runtime,
    /// Channel for receiving the result of asynchronous data loading.
    pipe: Option<Receiver<ContainerResult>>,
    /// Vector of active asynchronous tasks. Used to prevent the app from hanging.
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Default for BacklogViewApp {
    fn default() -> Self {
        Self {
            data_container: None,
            selection: FilterSelection::default(),
            sources: DataSources::default(),
            cache: Arc::new(SheetCache::new()),
            notification: None,
            runtime: tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("Failed to build Tokio runtime"),
            pipe: None,
            tasks: Vec::new(),
        }
    }
}

impl BacklogViewApp {
    /// Creates a new `BacklogViewApp` and kicks off the initial workbook load.
    pub fn new_with_sources(
        cc: &eframe::CreationContext<'_>,
        sources: DataSources,
    ) -> BacklogViewResult<Self> {
        let mut app = Self {
            sources,
            ..Default::default()
        };
        cc.egui_ctx.set_style_init(Visuals::dark()); // Apply custom styles.

        let future =
            DataContainer::load_data(app.sources.clone(), Arc::clone(&app.cache));
        app.run_data_future(Box::new(Box::pin(future)), &cc.egui_ctx);
        Ok(app)
    }

    /// Checks if a Notification is active and displays it.
    fn check_notification(&mut self, ctx: &Context) {
        if let Some(notification) = &mut self.notification {
            if !notification.show(ctx) {
                self.notification = None; // Remove closed Notification.
            }
        }
    }

    /// Checks if there is a pending data loading operation (asynchronous).
    /// If data is available or an error occurred, process it. If the operation is
    /// still in progress, keeps it in the `pipe`. Returns `true` if loading is
    /// pending, `false` if loading is complete (either with data or an error).
    fn check_data_pending(&mut self) -> bool {
        // Attempt to take ownership of the receiver. If it's None (no pending operation), return false.
        let Some(mut output) = self.pipe.take() else {
            return false;
        };

        match output.try_recv() {
            Ok(data_result) => {
                match data_result {
                    Ok(container) => {
                        // Store the DataContainer (wrapped in Arc for shared ownership).
                        self.data_container = Some(Arc::new(container));
                        false
                    }
                    Err(err) => {
                        // Create and display the error Notification.
                        self.notification = Some(Box::new(Error {
                            message: err.to_string(),
                        }));
                        error!("Data loading failed: {}", err);
                        false
                    }
                }
            }
            Err(try_recv_error) => match try_recv_error {
                // The channel is empty (data not yet available). The normal "pending" state.
                TryRecvError::Empty => {
                    self.pipe = Some(output);
                    true
                }
                // The channel is closed (the sender was dropped). An unexpected error state.
                TryRecvError::Closed => {
                    let err = BacklogViewError::ChannelReceive(
                        "Data operation terminated without response.".to_string(),
                    );
                    self.notification = Some(Box::new(Error {
                        message: err.to_string(),
                    }));
                    error!("{}", err);
                    false
                }
            },
        }
    }

    /// Runs a `DataFuture` to load data asynchronously.
    ///
    /// Takes a future, spawns a Tokio task, and sets up a channel to receive the result.
    fn run_data_future(&mut self, future: DataFuture, ctx: &Context) {
        // Before scheduling a new future, ensure no tasks are stuck.
        self.tasks.retain(|task| !task.is_finished());

        let (tx, rx) = oneshot::channel::<ContainerResult>();
        self.pipe = Some(rx);

        // Clone the context for use within the asynchronous task (to request repaints).
        let ctx_clone = ctx.clone();

        let handle = self.runtime.spawn(async move {
            let data = future.await;
            if tx.send(data).is_err() {
                error!("Receiver dropped before data could be sent.");
            }

            // Request a repaint of the UI to display the loaded data.
            ctx_clone.request_repaint();
        });

        self.tasks.push(handle); // Track the task.
    }

    /// Schedules a full reload: drops every cached worksheet and loads the
    /// configured workbooks again.
    fn reload(&mut self, ctx: &Context) {
        self.cache.clear();
        let future = DataContainer::load_data(self.sources.clone(), Arc::clone(&self.cache));
        self.run_data_future(Box::new(Box::pin(future)), ctx);
    }

    /// Renders the dashboard body: forecast table + chart, shipment and
    /// backorder tables, and the ETA card, all derived from the immutable
    /// container through the current `FilterSelection`.
    fn render_dashboard(&self, ui: &mut egui::Ui, container: &DataContainer) -> BacklogViewResult<()> {
        // Recovered load failures first, so a half-loaded dashboard explains itself.
        for message in container.load_errors.iter() {
            ui.colored_label(Color32::from_rgb(200, 120, 0), format!("⚠ {message}"));
        }
        if !container.load_errors.is_empty() {
            ui.separator();
        }

        let sku_models = resolve_sku(&container.link, &self.selection.sku_query);
        let shipments = apply_filters(
            &container.shipments,
            &self.selection,
            &sku_models,
            SHIPMENT_DATE_FIELD,
        )?;
        let backorders = apply_filters(
            &container.backorders,
            &self.selection,
            &sku_models,
            BACKORDER_DATE_FIELD,
        )?;
        let forecast = forecast_for_selection(&container.forecast, &self.selection, &sku_models)?;

        let no_match = self.selection.has_query()
            && shipments.height() == 0
            && backorders.height() == 0
            && forecast.height() == 0;
        if no_match {
            ui.label("No records match the current filters.");
            return Ok(());
        }

        ui.heading("Forecast");
        if forecast.height() == 0 {
            ui.label("No forecast rows for the current filters.");
        } else {
            render_table(ui, &forecast, "forecast_table");

            let quarter_order = sorted_quarter_columns(
                forecast.get_column_names_str().into_iter(),
            );
            let series = to_chart_series(&forecast, &quarter_order)?;
            render_chart(ui, &series, &quarter_order);
        }

        ui.separator();
        ui.heading("Shipments");
        if shipments.height() == 0 {
            ui.label("No shipment records.");
        } else {
            let with_sku = attach_sku(&shipments, &container.link)?;
            render_table(ui, &with_sku, "shipment_table");
        }

        ui.separator();
        ui.heading("Backorders");
        if backorders.height() == 0 {
            ui.label("No backorder records.");
        } else {
            render_table(ui, &backorders, "backorder_table");
        }

        // The ETA card only makes sense for a concrete query.
        if self.selection.has_query() {
            ui.separator();
            match find_eta_card(
                &container.link,
                &self.selection.search_query,
                &self.selection.sku_query,
            ) {
                Some(card) => {
                    Frame::default()
                        .stroke(Stroke::new(1.0, Color32::GRAY))
                        .outer_margin(2.0)
                        .inner_margin(10.0)
                        .show(ui, |ui| {
                            Grid::new("eta_card")
                                .num_columns(2)
                                .spacing([10.0, 4.0])
                                .show(ui, |ui| {
                                    ui.strong("ETA:");
                                    ui.label(&card.eta);
                                    ui.end_row();
                                    ui.strong("Note:");
                                    ui.label(&card.note);
                                    ui.end_row();
                                });
                        });
                }
                None => {
                    ui.label("No lead-time row matches the current query.");
                }
            }
        }

        Ok(())
    }
}

/// Restricts the forecast table to the models matched by the current queries.
/// Each active query contributes one predicate on the model identifier: the
/// search query as a case-insensitive substring, the SKU query as membership
/// in its resolved model set. Both active means both must hold. With no query
/// at all the full forecast passes through.
fn forecast_for_selection(
    forecast: &DataFrame,
    selection: &FilterSelection,
    sku_models: &[String],
) -> BacklogViewResult<DataFrame> {
    if !selection.has_query() || forecast.is_empty() {
        return Ok(forecast.clone());
    }
    let Ok(column) = forecast.column(MODEL_COLUMN) else {
        return Ok(forecast.clone());
    };

    let needle = selection.search_query.trim().to_lowercase();
    let sku_active = !selection.sku_query.trim().is_empty();
    let series = column.as_materialized_series();
    let casted = if series.dtype() == &DataType::String {
        series.clone()
    } else {
        series.cast(&DataType::String)?
    };

    let mask: BooleanChunked = casted
        .str()?
        .iter()
        .map(|opt| {
            opt.is_some_and(|model| {
                let search_ok = needle.is_empty() || model.to_lowercase().contains(&needle);
                let sku_ok = !sku_active || sku_models.iter().any(|item| item == model);
                search_ok && sku_ok
            })
        })
        .collect();

    forecast.filter(&mask).map_err(Into::into)
}

// See
// https://github.com/emilk/egui/blob/master/examples/custom_window_frame/src/main.rs

impl eframe::App for BacklogViewApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        // Check and display any active Notifications (errors).
        self.check_notification(ctx);

        // Define the main UI layout.
        //
        //  | menu_bar        widgets |
        //  ---------------------------
        //  |         |   forecast    |
        //  | Filters |   shipments   |
        //  |         |   backorders  |
        //  ---------------------------
        //  | sources footer          |

        TopBottomPanel::top("top_panel").show(ctx, |ui| {
            menu::bar(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.menu_button("File", |ui| {
                        if ui.button("Reload").clicked() {
                            // Drop cached worksheets and re-read everything from disk.
                            self.reload(ctx);
                            ui.close_menu();
                        }

                        ui.menu_button("About", |ui| {
                            // Display application information.
                            Frame::default()
                                .stroke(Stroke::new(1.0, Color32::GRAY))
                                .outer_margin(2.0)
                                .inner_margin(10.0)
                                .show(ui, |ui| {
                                    let version = env!("CARGO_PKG_VERSION");
                                    let description = env!("CARGO_PKG_DESCRIPTION");

                                    Grid::new("about_grid")
                                        .num_columns(1)
                                        .spacing([10.0, 4.0])
                                        .show(ui, |ui| {
                                            ui.with_layout(
                                                Layout::centered_and_justified(
                                                    Direction::LeftToRight,
                                                ),
                                                |ui| {
                                                    ui.label(
                                                        RichText::new("Backlog View")
                                                            .font(FontId::proportional(30.0)),
                                                    );
                                                },
                                            );
                                            ui.end_row();

                                            ui.with_layout(
                                                Layout::centered_and_justified(
                                                    Direction::LeftToRight,
                                                ),
                                                |ui| {
                                                    ui.label(format!("Version: {version}"));
                                                },
                                            );
                                            ui.end_row();
                                            ui.end_row();

                                            ui.with_layout(
                                                Layout::centered_and_justified(
                                                    Direction::LeftToRight,
                                                ),
                                                |ui| {
                                                    ui.label(
                                                        RichText::new(description)
                                                            .font(FontId::proportional(20.0)),
                                                    );
                                                },
                                            );
                                            ui.end_row();
                                            ui.end_row();

                                            ui.horizontal(|ui| {
                                                let url = "https://github.com/pola-rs/polars";
                                                let heading =
                                                    Hyperlink::from_label_and_url("Polars", url);

                                                ui.label("Powered by ");
                                                ui.add(heading).on_hover_text(url);
                                            });
                                            ui.end_row();

                                            ui.horizontal(|ui| {
                                                let url = "https://github.com/emilk/egui";
                                                let heading =
                                                    Hyperlink::from_label_and_url("egui", url);

                                                ui.label("Built with ");
                                                ui.add(heading).on_hover_text(url);
                                            });
                                            ui.end_row();

                                            ui.horizontal(|ui| {
                                                let url = "https://github.com/tafia/calamine";
                                                let heading =
                                                    Hyperlink::from_label_and_url("calamine", url);

                                                ui.label("Workbooks read by ");
                                                ui.add(heading).on_hover_text(url);
                                            });
                                            ui.end_row();
                                        });
                                });
                        });

                        if ui.button("Quit").clicked() {
                            // Close the application.
                            ui.ctx().send_viewport_cmd(ViewportCommand::Close);
                        }
                    });

                    // Add spacing to align theme switch to the right.
                    let delta = ui.available_width() - 15.0;
                    if delta > 0.0 {
                        ui.add_space(delta);
                        widgets::global_theme_preference_switch(ui);
                    }
                });
            });
        });

        SidePanel::left("side_panel")
            .resizable(true)
            .show(ctx, |ui| {
                ScrollArea::vertical().show(ui, |ui| {
                    ui.collapsing("Search", |ui| {
                        ui.label("PO# / Model:");
                        ui.text_edit_singleline(&mut self.selection.search_query);
                        ui.label("SKU:");
                        ui.text_edit_singleline(&mut self.selection.sku_query);
                    });

                    // Option lists are derived from the loaded record tables.
                    if let Some(container) = self.data_container.clone() {
                        let frames = [
                            container.shipments.as_ref(),
                            container.backorders.as_ref(),
                        ];

                        ui.collapsing("Ship To Country", |ui| {
                            for country in unique_column_values(&frames, COUNTRY_FIELD) {
                                toggle_membership(ui, &mut self.selection.countries, &country);
                            }
                        });
                        ui.collapsing("Ship To City", |ui| {
                            for city in unique_column_values(&frames, CITY_FIELD) {
                                toggle_membership(ui, &mut self.selection.cities, &city);
                            }
                        });
                    }

                    if ui.button("Clear filters").clicked() {
                        self.selection = FilterSelection::default();
                    }
                });
            });

        TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
            // Display the paths of the loaded workbooks.
            ui.horizontal(|ui| {
                ui.label(format!(
                    "{} | {} | {}",
                    self.sources.backlog.display(),
                    self.sources.planning.display(),
                    self.sources.lead_time.display()
                ));
            });
        });

        // Main display area.
        // CentralPanel must be added after all other panels in your egui layout!
        CentralPanel::default().show(ctx, |ui| {
            // Display a warning message if the application is built in debug mode.
            warn_if_debug_build(ui);

            // Disable UI interaction while data is being loaded (data_pending is true).
            if self.check_data_pending() {
                ui.disable();
            }

            match self.data_container.clone() {
                Some(container) => {
                    let result = ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            ui.style_mut().spacing.scroll.handle_min_length = 32.0;
                            self.render_dashboard(ui, &container)
                        })
                        .inner;

                    if let Err(err) = result {
                        error!("Dashboard rendering failed: {}", err);
                        self.notification = Some(Box::new(Error {
                            message: err.to_string(),
                        }));
                    }
                }
                None => {
                    if self.check_data_pending() {
                        // Initial load in progress: show a spinner in the center.
                        ui.centered_and_justified(|ui| {
                            ui.spinner();
                        });
                    } else {
                        ui.centered_and_justified(|ui| {
                            ui.label("No workbooks loaded. Use File > Reload.");
                        });
                    }
                }
            }
        });
    }
}

/// Renders one checkbox and toggles the value in/out of the selection list.
fn toggle_membership(ui: &mut egui::Ui, selected: &mut Vec<String>, value: &str) {
    let mut checked = selected.iter().any(|item| item == value);
    if ui.checkbox(&mut checked, value).changed() {
        if checked {
            selected.push(value.to_string());
        } else {
            selected.retain(|item| item != value);
        }
    }
}

//----------------------------------------------------------------------------//
//                                    Tests                                   //
//----------------------------------------------------------------------------//

/// Run tests with:
/// cargo test -- --show-output tests_layout`
#[cfg(test)]
mod tests_layout {
    use super::*;
    use polars::df;

    fn forecast_frame() -> DataFrame {
        df!(
            "Product ST Model Num" => &["M1", "M2", "XM10"],
            "Key Figure" => &["Backlog", "Backlog", "Backlog"],
            "Q1 2026" => &["1", "2", "3"],
        )
        .unwrap()
    }

    #[test]
    fn test_forecast_for_selection_no_query_passes_through() -> BacklogViewResult<()> {
        let selection = FilterSelection::default();
        let view = forecast_for_selection(&forecast_frame(), &selection, &[])?;
        assert_eq!(view.height(), 3);
        Ok(())
    }

    #[test]
    fn test_forecast_for_selection_search_substring() -> BacklogViewResult<()> {
        let selection = FilterSelection {
            search_query: "m1".to_string(),
            ..Default::default()
        };

        // "m1" matches M1 and XM10 (substring, case-insensitive).
        let view = forecast_for_selection(&forecast_frame(), &selection, &[])?;
        assert_eq!(view.height(), 2);
        Ok(())
    }

    #[test]
    fn test_forecast_for_selection_sku_models_exact() -> BacklogViewResult<()> {
        let selection = FilterSelection {
            sku_query: "some-sku".to_string(),
            ..Default::default()
        };
        let sku_models = vec!["M2".to_string()];

        let view = forecast_for_selection(&forecast_frame(), &selection, &sku_models)?;
        assert_eq!(view.height(), 1);
        assert_eq!(
            view.column(MODEL_COLUMN)?.get(0)?,
            AnyValue::String("M2")
        );
        Ok(())
    }

    #[test]
    fn test_forecast_for_selection_combined_queries_require_both() -> BacklogViewResult<()> {
        // Search and SKU query both active: a model must satisfy the search
        // substring AND the resolved set, not either one.
        let selection = FilterSelection {
            search_query: "po1".to_string(),
            sku_query: "some-sku".to_string(),
            ..Default::default()
        };
        let sku_models = vec!["M2".to_string()];

        // No model contains "po1", so the SKU-side match alone is not enough.
        let view = forecast_for_selection(&forecast_frame(), &selection, &sku_models)?;
        assert_eq!(view.height(), 0);

        // A model satisfying both predicates survives.
        let selection = FilterSelection {
            search_query: "m".to_string(),
            sku_query: "some-sku".to_string(),
            ..Default::default()
        };
        let view = forecast_for_selection(&forecast_frame(), &selection, &sku_models)?;
        assert_eq!(view.height(), 1);
        assert_eq!(view.column(MODEL_COLUMN)?.get(0)?, AnyValue::String("M2"));
        Ok(())
    }

    #[test]
    fn test_forecast_for_selection_no_match_is_empty() -> BacklogViewResult<()> {
        let selection = FilterSelection {
            search_query: "zzz".to_string(),
            ..Default::default()
        };
        let view = forecast_for_selection(&forecast_frame(), &selection, &[])?;
        assert_eq!(view.height(), 0);
        Ok(())
    }
}
