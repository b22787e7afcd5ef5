use crate::data_list::{DataList, RowKey};
use crate::fields::{user_width, RowField};
use crate::format::{print_kbytes, print_left_aligned_field, print_percentage, print_rate, print_time};
use crate::rich::{Attr, RichLine};
use crate::row::{Host, RenderContext, Row, RowCore, SortValue, TableFilter};
use crate::widths::WidthCycle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Process description as it appears in a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessRecord {
    pub pid: i32,
    #[serde(default)]
    pub ppid: i32,
    /// Thread group leader; defaults to the pid itself.
    #[serde(default)]
    pub tgid: Option<i32>,
    #[serde(default)]
    pub pgrp: i32,
    #[serde(default)]
    pub uid: Option<u32>,
    #[serde(default)]
    pub user: String,
    pub command: String,
    #[serde(default = "default_state")]
    pub state: char,
    #[serde(default)]
    pub percent_cpu: f32,
    #[serde(default)]
    pub percent_mem: f32,
    #[serde(default)]
    pub resident_kb: u64,
    #[serde(default)]
    pub time_hundredths: u64,
    #[serde(default = "default_nlwp")]
    pub nlwp: u64,
    #[serde(default)]
    pub io_rate: f64,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub nice: i64,
    #[serde(default)]
    pub kernel_thread: bool,
}

fn default_state() -> char {
    'S'
}

fn default_nlwp() -> u64 {
    1
}

/// An operating-system process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub core: RowCore,
    pub pgrp: i32,
    pub command: String,
    pub user: String,
    pub state: char,
    pub percent_cpu: f32,
    pub percent_mem: f32,
    pub resident_kb: u64,
    pub time_hundredths: u64,
    pub nlwp: u64,
    pub io_rate: f64,
    pub priority: i64,
    pub nice: i64,
    pub is_kernel_thread: bool,
}

impl ProcessRow {
    pub fn new(host: &Host) -> Self {
        Self {
            core: RowCore::new(host),
            pgrp: 0,
            command: String::new(),
            user: String::new(),
            state: default_state(),
            percent_cpu: 0.0,
            percent_mem: 0.0,
            resident_kb: 0,
            time_hundredths: 0,
            nlwp: 1,
            io_rate: 0.0,
            priority: 0,
            nice: 0,
            is_kernel_thread: false,
        }
    }

    pub fn from_record(host: &Host, record: &ProcessRecord) -> Self {
        let mut row = Self::new(host);
        row.update_from(record);
        row
    }

    /// Refreshes every sampled value; display state is left alone.
    pub fn update_from(&mut self, record: &ProcessRecord) {
        self.core.id = record.pid;
        self.core.parent = record.ppid;
        self.core.group = record.tgid.unwrap_or(record.pid);
        self.core.uid = record.uid;
        self.core.updated = true;
        self.pgrp = record.pgrp;
        self.command = record.command.clone();
        self.user = record.user.clone();
        self.state = record.state;
        self.percent_cpu = record.percent_cpu;
        self.percent_mem = record.percent_mem;
        self.resident_kb = record.resident_kb;
        self.time_hundredths = record.time_hundredths;
        self.nlwp = record.nlwp;
        self.io_rate = record.io_rate;
        self.priority = record.priority;
        self.nice = record.nice;
        self.is_kernel_thread = record.kernel_thread;
    }

    fn colored(&self, coloring: bool, attr: Attr) -> Attr {
        if coloring {
            attr
        } else {
            Attr::Normal
        }
    }
}

impl Row for ProcessRow {
    fn core(&self) -> &RowCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RowCore {
        &mut self.core
    }

    fn write_field(&self, out: &mut RichLine, field: RowField, ctx: &RenderContext<'_>) {
        let coloring = ctx.host.coloring;
        let pid_width = ctx.widths.pid_digits();
        match field {
            RowField::PID => out.append(Attr::Normal, &format!("{:>pid_width$} ", self.core.id)),
            RowField::PPID => out.append(Attr::Normal, &format!("{:>pid_width$} ", self.core.parent)),
            RowField::PGRP => out.append(Attr::Normal, &format!("{:>pid_width$} ", self.pgrp)),
            RowField::TGID => out.append(Attr::Normal, &format!("{:>pid_width$} ", self.core.group)),
            RowField::ST_UID => {
                let uid_width = ctx.widths.uid_digits();
                match self.core.uid {
                    Some(uid) => out.append(Attr::Normal, &format!("{uid:>uid_width$} ")),
                    None => out.append(self.colored(coloring, Attr::Shadow), &format!("{:>uid_width$} ", "N/A")),
                }
            }
            RowField::USER => {
                print_left_aligned_field(out, Attr::Normal, &self.user, user_width(ctx.widths));
            }
            RowField::COMM => {
                if ctx.tree_view {
                    out.append(self.colored(coloring, Attr::Tree), &self.core.tree_prefix());
                }
                let attr = if self.is_kernel_thread {
                    self.colored(coloring, Attr::Shadow)
                } else {
                    Attr::Normal
                };
                out.append(attr, &format!("{} ", self.command));
            }
            RowField::STATE => {
                let attr = match self.state {
                    'R' => self.colored(coloring, Attr::Highlight),
                    'D' | 'Z' => self.colored(coloring, Attr::LargeNumber),
                    _ => self.colored(coloring, Attr::Shadow),
                };
                out.append(attr, &format!("{} ", self.state));
            }
            RowField::PRIORITY => out.append(Attr::Normal, &format!("{:>3} ", self.priority)),
            RowField::NICE => {
                let attr = match self.nice {
                    n if n < 0 => self.colored(coloring, Attr::Highlight),
                    0 => Attr::Normal,
                    _ => self.colored(coloring, Attr::Shadow),
                };
                out.append(attr, &format!("{:>3} ", self.nice));
            }
            RowField::M_RESIDENT => print_kbytes(out, self.resident_kb, coloring),
            RowField::PERCENT_CPU | RowField::PERCENT_MEM => {
                let value = if field == RowField::PERCENT_CPU {
                    self.percent_cpu
                } else {
                    self.percent_mem
                };
                let (text, attr) = print_percentage(value, 4);
                out.append(self.colored(coloring, attr), &text);
            }
            RowField::TIME => print_time(out, self.time_hundredths, coloring),
            RowField::NLWP => out.append(Attr::Normal, &format!("{:>4} ", self.nlwp)),
            RowField::IO_RATE => print_rate(out, self.io_rate, coloring),
            _ => {}
        }
    }

    fn is_visible(&self, filter: &TableFilter) -> bool {
        !(filter.hide_kernel_threads && self.is_kernel_thread)
    }

    fn matches_filter(&self, filter: &TableFilter) -> bool {
        if filter.user_id.is_some() && filter.user_id != self.core.uid {
            return true;
        }
        match &filter.text {
            Some(text) => !self
                .command
                .to_lowercase()
                .contains(&text.to_lowercase()),
            None => false,
        }
    }

    fn sort_key_string(&self) -> String {
        self.command.clone()
    }

    fn sort_value(&self, field: RowField, _fields: &[RowField]) -> SortValue {
        match field {
            RowField::PID => SortValue::Int(i64::from(self.core.id)),
            RowField::PPID => SortValue::Int(i64::from(self.core.parent)),
            RowField::PGRP => SortValue::Int(i64::from(self.pgrp)),
            RowField::TGID => SortValue::Int(i64::from(self.core.group)),
            RowField::ST_UID => self.core.uid.map_or(SortValue::Missing, |uid| SortValue::Uint(u64::from(uid))),
            RowField::USER => SortValue::Text(self.user.clone()),
            RowField::COMM => SortValue::Text(self.sort_key_string()),
            RowField::STATE => SortValue::Text(self.state.to_string()),
            RowField::PRIORITY => SortValue::Int(self.priority),
            RowField::NICE => SortValue::Int(self.nice),
            RowField::M_RESIDENT => SortValue::Uint(self.resident_kb),
            RowField::PERCENT_CPU => SortValue::Float(f64::from(self.percent_cpu)),
            RowField::PERCENT_MEM => SortValue::Float(f64::from(self.percent_mem)),
            RowField::TIME => SortValue::Uint(self.time_hundredths),
            RowField::NLWP => SortValue::Uint(self.nlwp),
            RowField::IO_RATE => SortValue::Float(self.io_rate),
            _ => SortValue::Int(i64::from(self.core.id)),
        }
    }

    fn observe_widths(&self, _fields: &[RowField], cycle: &mut WidthCycle) {
        cycle.observe_pid(i64::from(self.core.id));
        cycle.observe_pid(i64::from(self.core.parent));
        if let Some(uid) = self.core.uid {
            cycle.observe_uid(uid);
        }
        cycle.update(RowField::USER, self.user.chars().count());
    }
}

/// What one [`sync_processes`] pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSync {
    pub added: usize,
    pub refreshed: usize,
    pub vanished: usize,
    pub dropped: usize,
}

/// Brings the process table in line with a fresh sample, matching rows by
/// pid. A vanished process stays as a tomb for the highlight delay and is
/// dropped once that passes; without change highlighting it goes at once.
pub fn sync_processes(
    list: &mut DataList<ProcessRow>,
    records: &[ProcessRecord],
    host: &Host,
) -> ProcessSync {
    let mut sync = ProcessSync::default();
    let by_pid = list
        .rows()
        .map(|(key, row)| (row.core.id, key))
        .collect::<HashMap<i32, RowKey>>();
    for row in list.rows_mut() {
        row.core.updated = false;
    }

    for record in records {
        match by_pid.get(&record.pid).and_then(|key| list.get_mut(*key)) {
            Some(row) => {
                if row.core.tomb_stamp_ms > 0 {
                    row.core.tomb_stamp_ms = 0;
                    row.core.seen_stamp_ms = host.now_ms;
                }
                row.update_from(record);
                sync.refreshed += 1;
            }
            None => {
                list.add_row(ProcessRow::from_record(host, record));
                sync.added += 1;
            }
        }
    }

    let mut expired = false;
    for row in list.rows_mut() {
        if row.core.updated {
            continue;
        }
        if row.core.tomb_stamp_ms == 0 {
            row.core.mark_tomb(host);
            sync.vanished += 1;
        }
        if !host.highlight_changes || !row.core.is_tomb(host) {
            expired = true;
        }
    }

    if expired {
        for row in list.take_rows() {
            let gone = !row.core.updated && (!host.highlight_changes || !row.core.is_tomb(host));
            if gone {
                sync.dropped += 1;
            } else {
                list.add_row(row);
            }
        }
    }

    list.set_needs_sort();
    sync
}
