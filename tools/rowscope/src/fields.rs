use crate::columns::{ColumnSource, DynamicColumns};
use crate::widths::FieldWidths;
use serde::{Deserialize, Serialize};

/// Identifier of a table column. Values below [`LAST_PROCESSFIELD`] are the
/// built-in process fields; dynamic columns are numbered from
/// [`ROW_DYNAMIC_FIELDS`] upwards in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowField(pub u32);

pub const LAST_PROCESSFIELD: u32 = 128;
pub const ROW_DYNAMIC_FIELDS: u32 = LAST_PROCESSFIELD;

impl RowField {
    pub const NULL: Self = Self(0);
    pub const PID: Self = Self(1);
    pub const COMM: Self = Self(2);
    pub const STATE: Self = Self(3);
    pub const PPID: Self = Self(4);
    pub const PGRP: Self = Self(5);
    pub const PRIORITY: Self = Self(18);
    pub const NICE: Self = Self(19);
    pub const M_RESIDENT: Self = Self(40);
    pub const ST_UID: Self = Self(46);
    pub const PERCENT_CPU: Self = Self(47);
    pub const PERCENT_MEM: Self = Self(48);
    pub const USER: Self = Self(49);
    pub const TIME: Self = Self(50);
    pub const NLWP: Self = Self(51);
    pub const TGID: Self = Self(52);
    pub const IO_RATE: Self = Self(64);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn is_dynamic(self) -> bool {
        self.0 >= ROW_DYNAMIC_FIELDS
    }

    /// Resolves a configuration name: built-in names first, then dynamic
    /// column names.
    pub fn from_name(name: &str, columns: &DynamicColumns) -> Option<Self> {
        BUILTIN_FIELDS
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.field)
            .or_else(|| columns.field_by_name(name))
    }

    /// Parses a whitespace separated field list, dropping unknown names.
    /// The unknown names are returned alongside so callers can report them.
    pub fn parse_list(text: &str, columns: &DynamicColumns) -> (Vec<Self>, Vec<String>) {
        let mut fields = Vec::new();
        let mut unknown = Vec::new();
        for name in text.split_whitespace() {
            match Self::from_name(name, columns) {
                Some(field) => fields.push(field),
                None => unknown.push(name.to_string()),
            }
        }
        (fields, unknown)
    }

    pub fn name(self, columns: &DynamicColumns) -> Option<String> {
        if let Some(spec) = builtin(self) {
            return Some(spec.name.to_string());
        }
        columns.resolve(self).map(|column| column.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleAlign {
    /// Fixed title, already padded to the rendered width.
    Fixed,
    /// Right aligned to the current PID digit count.
    Pid,
    /// Right aligned to the current UID digit count.
    Uid,
    /// Left aligned to the widest value seen this cycle.
    Auto,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: RowField,
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    align: TitleAlign,
}

pub const BUILTIN_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: RowField::PID, name: "PID", title: "PID", description: "Process/thread ID", align: TitleAlign::Pid },
    FieldSpec { field: RowField::COMM, name: "Command", title: "Command ", description: "Command line", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::STATE, name: "STATE", title: "S ", description: "Process state", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::PPID, name: "PPID", title: "PPID", description: "Parent process ID", align: TitleAlign::Pid },
    FieldSpec { field: RowField::PGRP, name: "PGRP", title: "PGRP", description: "Process group ID", align: TitleAlign::Pid },
    FieldSpec { field: RowField::PRIORITY, name: "PRIORITY", title: "PRI ", description: "Kernel scheduling priority", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::NICE, name: "NICE", title: " NI ", description: "Nice value", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::M_RESIDENT, name: "M_RESIDENT", title: "  RES ", description: "Resident set size", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::ST_UID, name: "ST_UID", title: "UID", description: "User ID of the process owner", align: TitleAlign::Uid },
    FieldSpec { field: RowField::PERCENT_CPU, name: "PERCENT_CPU", title: "CPU% ", description: "Percentage of CPU time used", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::PERCENT_MEM, name: "PERCENT_MEM", title: "MEM% ", description: "Percentage of memory used", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::USER, name: "USER", title: "USER", description: "Username of the process owner", align: TitleAlign::Auto },
    FieldSpec { field: RowField::TIME, name: "TIME", title: "  TIME+  ", description: "Total CPU time", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::NLWP, name: "NLWP", title: "NLWP ", description: "Number of threads", align: TitleAlign::Fixed },
    FieldSpec { field: RowField::TGID, name: "TGID", title: "TGID", description: "Thread group ID", align: TitleAlign::Pid },
    FieldSpec { field: RowField::IO_RATE, name: "IO_RATE", title: "   DISK R/W ", description: "Total I/O rate", align: TitleAlign::Fixed },
];

/// Smallest width the USER column shrinks to.
pub const MIN_USER_WIDTH: usize = 9;

pub fn builtin(field: RowField) -> Option<&'static FieldSpec> {
    BUILTIN_FIELDS.iter().find(|spec| spec.field == field)
}

/// Supplies header titles, padded to the width their column renders at.
pub trait TitleSource {
    fn aligned_title(&self, field: RowField) -> String;
}

/// Title source backed by this frame's widths and the configured columns.
pub struct FieldTitles<'a> {
    pub widths: &'a FieldWidths,
    pub columns: &'a DynamicColumns,
}

impl TitleSource for FieldTitles<'_> {
    fn aligned_title(&self, field: RowField) -> String {
        if let Some(spec) = builtin(field) {
            return match spec.align {
                TitleAlign::Fixed => spec.title.to_string(),
                TitleAlign::Pid => format!("{:>w$} ", spec.title, w = self.widths.pid_digits()),
                TitleAlign::Uid => format!("{:>w$} ", spec.title, w = self.widths.uid_digits()),
                TitleAlign::Auto => {
                    format!("{:<w$} ", spec.title, w = user_width(self.widths))
                }
            };
        }
        match self.columns.resolve(field) {
            Some(column) => {
                let width = dynamic_width(column.width, &column.heading, field, self.widths);
                if column.width < 0 {
                    format!("{:<width$} ", column.heading)
                } else {
                    format!("{:>width$} ", column.heading)
                }
            }
            None => String::new(),
        }
    }
}

pub fn user_width(widths: &FieldWidths) -> usize {
    widths.width(RowField::USER).unwrap_or(0).max(MIN_USER_WIDTH)
}

/// Rendered width of a dynamic column, not counting the separator.
pub fn dynamic_width(configured: i32, heading: &str, field: RowField, widths: &FieldWidths) -> usize {
    let observed = widths.width(field).unwrap_or(0);
    (configured.unsigned_abs() as usize)
        .max(observed)
        .max(heading.chars().count())
}

#[cfg(test)]
mod tests {
    use super::{FieldTitles, RowField, TitleSource, BUILTIN_FIELDS, MIN_USER_WIDTH};
    use crate::columns::{ColumnConfig, DynamicColumns};
    use crate::widths::WidthCycle;

    #[test]
    fn names_resolve_builtins_before_dynamic_columns() {
        let columns = DynamicColumns::from_config(&[ColumnConfig {
            name: "reads".to_string(),
            metric: "disk.read".to_string(),
            heading: None,
            caption: None,
            width: 0,
        }])
        .expect("columns");
        let (fields, unknown) = RowField::parse_list("PID  reads bogus Command", &columns);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], RowField::PID);
        assert!(fields[1].is_dynamic());
        assert_eq!(fields[2], RowField::COMM);
        assert_eq!(unknown, vec!["bogus".to_string()]);
        assert_eq!(fields[1].name(&columns).as_deref(), Some("reads"));
    }

    #[test]
    fn builtin_names_are_unique() {
        for (i, a) in BUILTIN_FIELDS.iter().enumerate() {
            for b in &BUILTIN_FIELDS[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.field, b.field);
            }
        }
    }

    #[test]
    fn pid_and_user_titles_follow_cycle_widths() {
        let mut cycle = WidthCycle::begin();
        cycle.observe_pid(4_194_304);
        cycle.update(RowField::USER, 12);
        let widths = cycle.finish();
        let columns = DynamicColumns::new();
        let titles = FieldTitles {
            widths: &widths,
            columns: &columns,
        };
        assert_eq!(titles.aligned_title(RowField::PID), "    PID ");
        assert_eq!(titles.aligned_title(RowField::USER).len(), 13);
        assert_eq!(titles.aligned_title(RowField::TIME), "  TIME+  ");

        let narrow = WidthCycle::begin().finish();
        let titles = FieldTitles {
            widths: &narrow,
            columns: &columns,
        };
        assert_eq!(titles.aligned_title(RowField::USER).len(), MIN_USER_WIDTH + 1);
    }

    #[test]
    fn dynamic_titles_honour_alignment_sign() {
        let columns = DynamicColumns::from_config(&[
            ColumnConfig {
                name: "dev".to_string(),
                metric: "disk.name".to_string(),
                heading: Some("DEVICE".to_string()),
                caption: None,
                width: -8,
            },
            ColumnConfig {
                name: "reads".to_string(),
                metric: "disk.read".to_string(),
                heading: Some("READS".to_string()),
                caption: None,
                width: 7,
            },
        ])
        .expect("columns");
        let widths = WidthCycle::begin().finish();
        let titles = FieldTitles {
            widths: &widths,
            columns: &columns,
        };
        let dev = columns.field_by_name("dev").expect("dev");
        let reads = columns.field_by_name("reads").expect("reads");
        assert_eq!(titles.aligned_title(dev), "DEVICE   ");
        assert_eq!(titles.aligned_title(reads), "  READS ");
        assert_eq!(titles.aligned_title(RowField(999)), "");
    }
}
