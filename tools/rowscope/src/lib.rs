pub mod columns;
pub mod config;
pub mod data_list;
pub mod errors;
pub mod fields;
pub mod format;
pub mod log_retention;
pub mod logging;
pub mod metric_row;
pub mod metrics;
pub mod process_row;
pub mod reconcile;
pub mod rich;
pub mod row;
pub mod runtime;
pub mod screen_settings;
pub mod screens;
pub mod snapshot;
pub mod tui;
pub mod widths;

use clap::{error::ErrorKind, Parser};
use columns::DynamicColumns;
use config::{load_config, AppConfig, CliOverrides};
use data_list::DataList;
use errors::RowscopeError;
use fields::{FieldTitles, RowField};
use logging::{append_run_log, init_run_log, structured_fallback_line, JsonlLogger};
use metric_row::MetricRow;
use metrics::InMemoryMetrics;
use process_row::{sync_processes, ProcessRow};
use reconcile::{scan, ScanOutcome};
use rich::RichLine;
use row::{Host, RenderContext, Row, TableFilter};
use runtime::ProductionRuntime;
use screen_settings::{available_screens, ScreenSettings, Settings, SortDirection};
use screens::DynamicScreens;
use serde_json::json;
use snapshot::{load_snapshot, Snapshot};
use std::path::Path;
use std::time::Duration;
use tui::{render_table, TableView};

#[derive(Debug, Clone, Parser)]
#[command(name = "rowscope")]
#[command(about = "Sortable, filterable tables of processes and recorded metrics")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    /// JSON file of recorded samples, one frame per refresh.
    #[arg(long)]
    pub snapshot: Option<std::path::PathBuf>,
    /// Screen to show, by dynamic screen name or heading.
    #[arg(long)]
    pub screen: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub cycles: u32,
    #[arg(long)]
    pub sort_key: Option<String>,
    #[arg(long, default_value_t = false, conflicts_with = "descending")]
    pub ascending: bool,
    #[arg(long, default_value_t = false)]
    pub descending: bool,
    #[arg(long, default_value_t = false)]
    pub tree: bool,
    #[arg(long)]
    pub filter: Option<String>,
    #[arg(long)]
    pub width: Option<u16>,
    #[arg(long)]
    pub height: Option<u16>,
    #[arg(long)]
    pub log: Option<std::path::PathBuf>,
    #[arg(long, default_value_t = false)]
    pub list_screens: bool,
}

pub fn run() -> Result<i32, RowscopeError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| RowscopeError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &Path,
    runtime: &ProductionRuntime,
) -> Result<i32, RowscopeError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(RowscopeError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        snapshot_path: cli.snapshot.clone(),
        log_path: cli.log.clone(),
        screen: cli.screen.clone(),
        tree_view: cli.tree,
        width: cli.width,
        height: cli.height,
        filter: cli.filter.clone(),
    };
    let cfg = load_config(&overrides, cwd, runtime.file_system.as_ref())?;

    if let Some(path) = &cfg.log.path {
        init_run_log(JsonlLogger {
            path: path.clone(),
            max_payload_bytes: cfg.log.max_payload_bytes,
            budget_bytes: cfg.log.budget_bytes,
        });
    }

    let mut columns = DynamicColumns::from_config(&cfg.columns)?;
    let registry = DynamicScreens::from_config(&cfg.screens)?;

    if cli.list_screens {
        for name in available_screens(&registry) {
            runtime.terminal.write_line(&name)?;
        }
        return Ok(0);
    }

    let snapshot_path = cfg.snapshot.path.as_ref().ok_or_else(|| {
        RowscopeError::Cli("a snapshot is required: pass --snapshot or set [snapshot] path".to_string())
    })?;
    let snapshot = load_snapshot(runtime.file_system.as_ref(), snapshot_path)?;

    let mut settings = Settings::with_defaults(&registry, &columns);
    apply_screen_overrides(&mut settings, &cfg, &cli, &columns)?;

    append_run_log(
        "info",
        "run.start",
        json!({
            "screens": settings.screens.len(),
            "columns": columns.len(),
            "frames": snapshot.frames.len(),
            "cycles": cli.cycles
        }),
    );

    let mut viewer = Viewer::new(&cfg);
    for cycle in 0..cli.cycles.max(1) as usize {
        let started = runtime.clock.now();
        viewer.run_cycle(runtime, &snapshot, cycle, &settings, &mut columns)?;
        if cycle + 1 < cli.cycles as usize {
            runtime
                .clock
                .sleep_until(started + Duration::from_millis(cfg.display.refresh_ms))?;
        }
    }

    append_run_log("info", "run.complete", json!({ "cycles": cli.cycles.max(1) }));
    Ok(0)
}

fn apply_screen_overrides(
    settings: &mut Settings,
    cfg: &AppConfig,
    cli: &Cli,
    columns: &DynamicColumns,
) -> Result<(), RowscopeError> {
    if let Some(name) = &cfg.display.active_screen {
        settings
            .select_by_name(name)
            .ok_or_else(|| RowscopeError::Cli(format!("unknown screen {name}")))?;
    }
    let Some(screen) = settings.active_mut() else {
        return Ok(());
    };
    if let Some(name) = &cli.sort_key {
        screen.sort_key = RowField::from_name(name, columns)
            .ok_or_else(|| RowscopeError::Cli(format!("unknown sort key {name}")))?;
    }
    if cli.ascending {
        screen.direction = SortDirection::Ascending;
    } else if cli.descending {
        screen.direction = SortDirection::Descending;
    }
    if cfg.display.tree_view {
        screen.tree_view = true;
    }
    Ok(())
}

/// State carried from one refresh to the next.
struct Viewer {
    backend: InMemoryMetrics,
    processes: DataList<ProcessRow>,
    metrics: DataList<MetricRow>,
    filter: TableFilter,
    highlight_delay_secs: u64,
    highlight_changes: bool,
    coloring: bool,
    width: u16,
    height: u16,
}

impl Viewer {
    fn new(cfg: &AppConfig) -> Self {
        Self {
            backend: InMemoryMetrics::new(),
            processes: DataList::new(),
            metrics: DataList::new(),
            filter: TableFilter {
                text: cfg.display.filter.clone(),
                user_id: None,
                hide_kernel_threads: cfg.display.hide_kernel_threads,
            },
            highlight_delay_secs: cfg.display.highlight_delay_secs,
            highlight_changes: cfg.display.highlight_changes,
            coloring: cfg.display.coloring,
            width: cfg.display.width,
            height: cfg.display.height,
        }
    }

    fn run_cycle(
        &mut self,
        runtime: &ProductionRuntime,
        snapshot: &Snapshot,
        cycle: usize,
        settings: &Settings,
        columns: &mut DynamicColumns,
    ) -> Result<(), RowscopeError> {
        let Some(frame) = snapshot.frame(cycle) else {
            return Ok(());
        };
        let Some(screen) = settings.active() else {
            return Ok(());
        };
        let mut host = Host::from_clock(runtime.clock.as_ref(), self.highlight_delay_secs);
        host.highlight_changes = self.highlight_changes;
        host.coloring = self.coloring;

        for rejected in frame.apply(&mut self.backend) {
            append_run_log("warn", "snapshot.value_rejected", json!({ "value": rejected }));
        }
        let unbound = columns.bind(&self.backend);
        if !unbound.is_empty() {
            append_run_log("debug", "columns.unbound", json!({ "columns": unbound }));
        }

        let mut status = None;
        let (header, lines) = if screen.is_dynamic() {
            match scan(
                &mut self.metrics,
                screen,
                &*columns,
                &self.backend,
                &MetricRow::new,
                &host,
                false,
            ) {
                Ok(ScanOutcome::DomainMismatch) => {
                    status = Some(format!(
                        "screen {} mixes columns from different instance domains",
                        screen.heading
                    ));
                }
                Ok(_) => {}
                Err(err @ RowscopeError::ScreenConfig(_)) => {
                    append_run_log(
                        "error",
                        "scan.config_error",
                        json!({ "screen": screen.heading, "error": err.to_string() }),
                    );
                    status = Some(err.to_string());
                }
                Err(err) => return Err(err),
            }
            render_rows(&mut self.metrics, screen, &self.filter, &host, columns)
        } else {
            let sync = sync_processes(&mut self.processes, &frame.processes, &host);
            append_run_log(
                "debug",
                "processes.synced",
                json!({
                    "added": sync.added,
                    "refreshed": sync.refreshed,
                    "vanished": sync.vanished,
                    "dropped": sync.dropped
                }),
            );
            render_rows(&mut self.processes, screen, &self.filter, &host, columns)
        };

        if runtime.terminal.stdout_is_tty() {
            let view = TableView {
                tabs: settings.screens.iter().map(|s| s.heading.clone()).collect(),
                active_tab: settings.active,
                header,
                lines,
                status,
                coloring: self.coloring,
            };
            runtime.terminal.draw(&render_table(&view, self.width, self.height)?)?;
        } else {
            let heading = &screen.heading;
            runtime
                .terminal
                .write_line(&structured_fallback_line(heading, "header", &header.text()))?;
            for (index, line) in lines.iter().enumerate() {
                runtime.terminal.write_line(&structured_fallback_line(
                    heading,
                    &index.to_string(),
                    &line.text(),
                ))?;
            }
            if let Some(status) = status {
                runtime
                    .terminal
                    .write_line(&structured_fallback_line(heading, "status", &status))?;
            }
        }
        Ok(())
    }
}

/// Orders the list for `screen` and renders its header and rows.
fn render_rows<R: Row>(
    list: &mut DataList<R>,
    screen: &ScreenSettings,
    filter: &TableFilter,
    host: &Host,
    columns: &DynamicColumns,
) -> (RichLine, Vec<RichLine>) {
    list.rebuild_display_list_filtered(screen, filter);
    let widths = list.measure_widths(&screen.fields);
    let titles = FieldTitles {
        widths: &widths,
        columns,
    };
    let mut header = RichLine::new();
    list.print_header(screen, &titles, &mut header);
    let ctx = RenderContext {
        host,
        widths: &widths,
        fields: &screen.fields,
        columns,
        tree_view: screen.tree_view,
    };
    (header, list.display_lines(&ctx))
}
