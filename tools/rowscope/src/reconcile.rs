//! Per-cycle reconciliation of a dynamic screen's table with the metrics
//! backend.
//!
//! One call to [`scan`] picks the instance domain behind the screen's
//! columns, grows or shrinks the row list at its tail to the domain size,
//! makes every row carry one cell per column, and stamps each cell with the
//! value just fetched for its instance. Rows are addressed by key, and a
//! row's key is the domain offset it shows, so a fill for offset `k` always
//! lands on row `k`.

use crate::columns::ColumnSource;
use crate::data_list::DataList;
use crate::errors::RowscopeError;
use crate::logging::append_run_log;
use crate::metric_row::{FieldCell, MetricRow};
use crate::metrics::{DomainId, MetricsBackend};
use crate::row::{Host, RowFactory};
use crate::screen_settings::ScreenSettings;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub domain: DomainId,
    pub rows: usize,
    pub columns: usize,
    pub rows_added: usize,
    pub rows_removed: usize,
    pub filled_cells: usize,
    pub skipped_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Updates are paused; nothing was touched.
    Paused,
    /// The screen is not a dynamic screen.
    Skipped,
    /// The screen's columns span more than one instance domain.
    DomainMismatch,
    /// The domain is empty or unknown; the table was emptied.
    Empty { rows_removed: usize },
    Filled(ScanReport),
}

enum DomainSelection {
    Single(Option<DomainId>),
    Mixed,
}

/// Runs one reconciliation cycle for `screen`.
///
/// A field without a dynamic column is a configuration error for this
/// screen; the list is left as it was. Cells that cannot be filled keep
/// their previous value and are counted in [`ScanReport::skipped_cells`].
pub fn scan<F>(
    list: &mut DataList<MetricRow>,
    screen: &ScreenSettings,
    columns: &dyn ColumnSource,
    backend: &dyn MetricsBackend,
    factory: &F,
    host: &Host,
    pause_update: bool,
) -> Result<ScanOutcome, RowscopeError>
where
    F: RowFactory<MetricRow> + ?Sized,
{
    if pause_update {
        return Ok(ScanOutcome::Paused);
    }
    let Some(name) = screen.dynamic.as_deref() else {
        return Ok(ScanOutcome::Skipped);
    };

    let domain = match select_domain(name, screen, columns)? {
        DomainSelection::Single(domain) => domain,
        DomainSelection::Mixed => {
            append_run_log(
                "debug",
                "scan.domain_mismatch",
                json!({ "screen": name, "fields": screen.fields.len() }),
            );
            return Ok(ScanOutcome::DomainMismatch);
        }
    };

    let required_rows = domain
        .map(|domain| backend.instance_count(domain).max(0))
        .unwrap_or(0) as usize;
    let required_columns = screen.fields.len().max(1);

    let (rows_added, rows_removed) = alloc_rows(list, required_rows, factory, host);
    list.set_needs_sort();
    let Some(domain) = domain.filter(|_| required_rows > 0) else {
        append_run_log(
            "debug",
            "scan.empty",
            json!({ "screen": name, "rows_removed": rows_removed }),
        );
        return Ok(ScanOutcome::Empty { rows_removed });
    };

    alloc_columns(list, required_columns);
    let (filled_cells, skipped_cells) = fill_values(list, screen, columns, backend, domain);

    let report = ScanReport {
        domain,
        rows: list.total_rows(),
        columns: required_columns,
        rows_added,
        rows_removed,
        filled_cells,
        skipped_cells,
    };
    append_run_log(
        "debug",
        "scan.filled",
        json!({
            "screen": name,
            "domain": domain.0,
            "rows": report.rows,
            "columns": report.columns,
            "rows_added": rows_added,
            "rows_removed": rows_removed,
            "filled_cells": filled_cells,
            "skipped_cells": skipped_cells
        }),
    );
    Ok(ScanOutcome::Filled(report))
}

fn select_domain(
    name: &str,
    screen: &ScreenSettings,
    columns: &dyn ColumnSource,
) -> Result<DomainSelection, RowscopeError> {
    if screen.fields.is_empty() {
        return Err(RowscopeError::ScreenConfig(format!(
            "no configuration for screen {name}"
        )));
    }
    if !screen.unresolved.is_empty() {
        return Err(RowscopeError::ScreenConfig(format!(
            "screen {name}: no dynamic column named {}",
            screen.unresolved.join(", ")
        )));
    }
    let mut selected: Option<Option<DomainId>> = None;
    for field in &screen.fields {
        let column = columns.resolve(*field).ok_or_else(|| {
            RowscopeError::ScreenConfig(format!(
                "screen {name}: field {} has no dynamic column",
                field.0
            ))
        })?;
        let domain = columns.instance_domain_of(column);
        match selected {
            None => selected = Some(domain),
            Some(previous) if previous != domain => return Ok(DomainSelection::Mixed),
            Some(_) => {}
        }
    }
    Ok(DomainSelection::Single(selected.flatten()))
}

/// Grows or shrinks the list at its tail until it holds `required` rows.
fn alloc_rows<F>(
    list: &mut DataList<MetricRow>,
    required: usize,
    factory: &F,
    host: &Host,
) -> (usize, usize)
where
    F: RowFactory<MetricRow> + ?Sized,
{
    let mut removed = 0;
    while list.total_rows() > required {
        let last = list.total_rows() - 1;
        if let Some(row) = list.get_mut(last) {
            row.remove_all_fields();
        }
        list.remove_last_row();
        removed += 1;
    }
    let mut added = 0;
    while list.total_rows() < required {
        let mut row = factory.create(host);
        row.offset = list.total_rows();
        list.add_row(row);
        added += 1;
    }
    (added, removed)
}

/// Brings every row to exactly `required` cells. Rows added this cycle
/// start with none.
fn alloc_columns(list: &mut DataList<MetricRow>, required: usize) {
    for row in list.rows_mut() {
        while row.fields_count() < required {
            row.add_field();
        }
        while row.fields_count() > required {
            row.remove_field();
        }
    }
}

fn fill_values(
    list: &mut DataList<MetricRow>,
    screen: &ScreenSettings,
    columns: &dyn ColumnSource,
    backend: &dyn MetricsBackend,
    domain: DomainId,
) -> (usize, usize) {
    let mut filled = 0;
    let mut skipped = 0;
    for instance in backend.instances(domain) {
        for (position, field) in screen.fields.iter().enumerate() {
            let metric = columns.resolve(*field).and_then(|column| column.metric);
            let descriptor = metric.and_then(|metric| backend.describe(metric));
            let (Some(metric), Some(descriptor)) = (metric, descriptor) else {
                skipped += 1;
                skip_cell("unresolved_column", instance.offset, position);
                continue;
            };
            let Some(row) = list.get_mut(instance.offset) else {
                skipped += 1;
                skip_cell("missing_row", instance.offset, position);
                continue;
            };
            row.offset = instance.offset;
            row.core.id = instance.offset as i32;
            row.core.updated = true;
            let Some(value) = backend.fetch_value(metric, instance.id, instance.offset, &descriptor) else {
                skipped += 1;
                skip_cell("fetch_failed", instance.offset, position);
                continue;
            };
            let Some(cell) = row.cell_mut(position) else {
                skipped += 1;
                skip_cell("missing_cell", instance.offset, position);
                continue;
            };
            *cell = FieldCell {
                metric_id: Some(metric),
                descriptor: Some(descriptor),
                value: Some(value),
                offset: instance.offset,
                instance_id: instance.id,
            };
            filled += 1;
        }
    }
    (filled, skipped)
}

fn skip_cell(reason: &str, offset: usize, position: usize) {
    append_run_log(
        "warn",
        "scan.cell_skipped",
        json!({ "reason": reason, "offset": offset, "column": position }),
    );
}

#[cfg(test)]
mod tests {
    use super::{scan, ScanOutcome};
    use crate::columns::{ColumnConfig, DynamicColumns};
    use crate::data_list::DataList;
    use crate::errors::RowscopeError;
    use crate::metric_row::MetricRow;
    use crate::metrics::{DomainId, InMemoryMetrics, MetricId, MetricType, MetricValue, MetricsBackend, Units};
    use crate::row::Host;
    use crate::screen_settings::{ScreenSettings, SortDirection};
    use crate::screens::DynamicScreen;

    const DISKS: DomainId = DomainId(1);
    const NETS: DomainId = DomainId(2);

    struct Fixture {
        backend: InMemoryMetrics,
        columns: DynamicColumns,
        list: DataList<MetricRow>,
        host: Host,
    }

    impl Fixture {
        fn new(instances: &[i32]) -> Self {
            let mut backend = InMemoryMetrics::new();
            for (name, domain) in [("disk.a", DISKS), ("disk.b", DISKS), ("disk.c", DISKS), ("net.x", NETS)] {
                backend.register(name, MetricType::U64, Units::Count, Some(domain));
            }
            backend.set_instances(NETS, &[100]);
            let mut fixture = Self {
                backend,
                columns: DynamicColumns::from_config(
                    &[("a", "disk.a"), ("b", "disk.b"), ("c", "disk.c"), ("x", "net.x")].map(|(name, metric)| {
                        ColumnConfig {
                            name: name.to_string(),
                            metric: metric.to_string(),
                            heading: None,
                            caption: None,
                            width: 0,
                        }
                    }),
                )
                .expect("columns"),
                list: DataList::new(),
                host: Host::new(0, 0),
            };
            assert!(fixture.columns.bind(&fixture.backend).is_empty());
            fixture.set_disks(instances);
            fixture
        }

        /// Every disk metric reports `instance * 10 + column` for each instance.
        fn set_disks(&mut self, instances: &[i32]) {
            self.backend.set_instances(DISKS, instances);
            for (column, name) in ["disk.a", "disk.b", "disk.c"].iter().enumerate() {
                let metric = metric_id(&self.backend, name);
                self.backend.clear_values(metric);
                for instance in instances {
                    self.backend.set_value(
                        metric,
                        *instance,
                        MetricValue::U64(*instance as u64 * 10 + column as u64),
                    );
                }
            }
        }

        fn screen(&self, fields: &str) -> ScreenSettings {
            ScreenSettings::from_dynamic(
                &DynamicScreen {
                    name: "disks".to_string(),
                    heading: "Disks".to_string(),
                    caption: String::new(),
                    fields: fields.to_string(),
                    sort_key: String::new(),
                    direction: SortDirection::Ascending,
                },
                &self.columns,
            )
        }

        fn run(&mut self, fields: &str) -> Result<ScanOutcome, RowscopeError> {
            let screen = self.screen(fields);
            scan(
                &mut self.list,
                &screen,
                &self.columns,
                &self.backend,
                &MetricRow::new,
                &self.host,
                false,
            )
        }

        fn value(&self, key: usize, position: usize) -> Option<MetricValue> {
            self.list
                .get(key)
                .and_then(|row| row.cell(position))
                .and_then(|cell| cell.value.clone())
        }
    }

    fn metric_id(backend: &InMemoryMetrics, name: &str) -> MetricId {
        backend.lookup_metric(name).expect("metric")
    }

    #[test]
    fn fills_then_shrinks_to_surviving_offsets() {
        let mut fixture = Fixture::new(&[10, 11, 12, 13]);
        let outcome = fixture.run("a b c").expect("scan");
        let ScanOutcome::Filled(report) = outcome else {
            panic!("expected a filled table, got {outcome:?}");
        };
        assert_eq!((report.rows, report.columns), (4, 3));
        assert_eq!(report.filled_cells, 12);
        assert_eq!(report.skipped_cells, 0);
        assert!(fixture.list.rows().all(|(_, row)| row.fields_count() == 3));
        assert_eq!(fixture.value(3, 2), Some(MetricValue::U64(132)));

        fixture.set_disks(&[10, 11]);
        let outcome = fixture.run("a b c").expect("scan");
        let ScanOutcome::Filled(report) = outcome else {
            panic!("expected a filled table, got {outcome:?}");
        };
        assert_eq!(report.rows_removed, 2);
        assert_eq!(fixture.list.total_rows(), 2);
        for key in 0..2 {
            let row = fixture.list.get(key).expect("row");
            assert_eq!(row.fields_count(), 3);
            assert_eq!(row.offset, key);
            assert_eq!(row.core.id, key as i32);
        }
        assert_eq!(fixture.value(0, 0), Some(MetricValue::U64(100)));
        assert_eq!(fixture.value(1, 1), Some(MetricValue::U64(111)));
    }

    #[test]
    fn mixed_domains_leave_the_table_alone() {
        let mut fixture = Fixture::new(&[10, 11, 12]);
        fixture.run("a b").expect("scan");
        let before = fixture.list.clone();

        let outcome = fixture.run("a x").expect("mixed domains are not an error");
        assert_eq!(outcome, ScanOutcome::DomainMismatch);
        assert_eq!(fixture.list.total_rows(), before.total_rows());
        for key in 0..before.total_rows() {
            assert_eq!(fixture.list.get(key), before.get(key));
        }
    }

    #[test]
    fn row_count_converges_to_the_domain_size() {
        let mut fixture = Fixture::new(&[]);
        for size in [0usize, 3, 7, 7, 2, 0, 5] {
            let instances = (0..size as i32).map(|i| 50 + i).collect::<Vec<_>>();
            fixture.set_disks(&instances);
            let outcome = fixture.run("a b c").expect("scan");
            assert_eq!(fixture.list.total_rows(), size);
            if size == 0 {
                assert!(matches!(outcome, ScanOutcome::Empty { .. }));
                continue;
            }
            let ScanOutcome::Filled(report) = outcome else {
                panic!("expected a filled table, got {outcome:?}");
            };
            assert_eq!(report.skipped_cells, 0);
            assert_eq!(report.filled_cells, size * 3);
            assert!(fixture.list.rows().all(|(_, row)| row.fields_count() == 3));
            for (key, instance) in instances.iter().enumerate() {
                assert_eq!(fixture.value(key, 2), Some(MetricValue::U64(*instance as u64 * 10 + 2)));
            }
        }
    }

    #[test]
    fn rows_added_to_a_filled_table_get_every_column() {
        let mut fixture = Fixture::new(&[10, 11]);
        fixture.run("a b c").expect("scan");

        fixture.set_disks(&[10, 11, 12, 13]);
        let ScanOutcome::Filled(report) = fixture.run("a b c").expect("scan") else {
            panic!("expected a filled table");
        };
        assert_eq!(report.rows_added, 2);
        assert_eq!((report.filled_cells, report.skipped_cells), (12, 0));
        let counts = fixture
            .list
            .rows()
            .map(|(_, row)| row.fields_count())
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![3, 3, 3, 3]);
        assert_eq!(fixture.value(2, 0), Some(MetricValue::U64(120)));
        assert_eq!(fixture.value(3, 1), Some(MetricValue::U64(131)));
        assert_eq!(fixture.list.get(3).map(|row| row.core.id), Some(3));
    }

    #[test]
    fn every_row_gets_the_column_count() {
        let mut fixture = Fixture::new(&[1, 2, 3]);
        fixture.run("a").expect("scan");
        assert!(fixture.list.rows().all(|(_, row)| row.fields_count() == 1));
        fixture.run("a b c").expect("scan");
        assert!(fixture.list.rows().all(|(_, row)| row.fields_count() == 3));

        // a row with a stray extra cell is trimmed with the rest
        fixture.list.get_mut(1).expect("row").add_field();
        fixture.run("b").expect("scan");
        assert!(fixture.list.rows().all(|(_, row)| row.fields_count() == 1));
        assert_eq!(fixture.value(2, 0), Some(MetricValue::U64(31)));
    }

    #[test]
    fn fills_land_on_the_row_keyed_by_offset() {
        let mut fixture = Fixture::new(&[7, 3, 9]);
        fixture.run("a").expect("scan");
        for (key, instance) in [7, 3, 9].iter().enumerate() {
            let cell = fixture.list.get(key).and_then(|row| row.cell(0)).expect("cell");
            assert_eq!(cell.offset, key);
            assert_eq!(cell.instance_id, *instance);
        }
    }

    #[test]
    fn failed_fetch_keeps_the_previous_value() {
        let mut fixture = Fixture::new(&[1, 2]);
        fixture.run("a").expect("scan");
        let metric = metric_id(&fixture.backend, "disk.a");
        fixture.backend.clear_values(metric);
        fixture.backend.set_value(metric, 1, MetricValue::U64(999));

        let ScanOutcome::Filled(report) = fixture.run("a").expect("scan") else {
            panic!("expected a filled table");
        };
        assert_eq!((report.filled_cells, report.skipped_cells), (1, 1));
        assert_eq!(fixture.value(0, 0), Some(MetricValue::U64(999)));
        assert_eq!(fixture.value(1, 0), Some(MetricValue::U64(20)));
    }

    #[test]
    fn unmapped_fields_are_a_configuration_error() {
        let mut fixture = Fixture::new(&[1, 2]);
        fixture.run("a").expect("scan");
        let err = fixture.run("PID a").expect_err("PID has no metric");
        assert!(matches!(err, RowscopeError::ScreenConfig(_)));
        assert_eq!(fixture.list.total_rows(), 2);

        let err = fixture.run("").expect_err("empty screen");
        assert!(err.to_string().contains("no configuration for screen disks"));
    }

    #[test]
    fn misspelled_columns_are_a_configuration_error() {
        let mut fixture = Fixture::new(&[1, 2]);
        fixture.run("a").expect("scan");
        let before = fixture.list.clone();

        let err = fixture.run("bogus a").expect_err("bogus names no column");
        assert!(matches!(err, RowscopeError::ScreenConfig(_)));
        assert!(err.to_string().contains("bogus"));
        for key in 0..before.total_rows() {
            assert_eq!(fixture.list.get(key), before.get(key));
        }
    }

    #[test]
    fn paused_and_builtin_screens_are_not_scanned() {
        let mut fixture = Fixture::new(&[1, 2]);
        let screen = fixture.screen("a");
        let outcome = scan(
            &mut fixture.list,
            &screen,
            &fixture.columns,
            &fixture.backend,
            &MetricRow::new,
            &fixture.host,
            true,
        )
        .expect("paused");
        assert_eq!(outcome, ScanOutcome::Paused);
        assert_eq!(fixture.list.total_rows(), 0);

        let mut builtin = screen.clone();
        builtin.dynamic = None;
        let outcome = scan(
            &mut fixture.list,
            &builtin,
            &fixture.columns,
            &fixture.backend,
            &MetricRow::new,
            &fixture.host,
            false,
        )
        .expect("builtin");
        assert_eq!(outcome, ScanOutcome::Skipped);
    }

    #[test]
    fn unknown_domain_empties_the_table() {
        let mut fixture = Fixture::new(&[1, 2]);
        fixture.run("a").expect("scan");
        fixture.backend.remove_domain(DISKS);
        let outcome = fixture.run("a").expect("scan");
        assert_eq!(outcome, ScanOutcome::Empty { rows_removed: 2 });
        assert!(fixture.list.is_empty());
    }
}
