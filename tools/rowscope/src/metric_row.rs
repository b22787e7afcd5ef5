use crate::columns::ColumnSource;
use crate::fields::{dynamic_width, RowField};
use crate::format::{print_bytes, print_count, print_kbytes, print_percentage, print_rate, print_time};
use crate::metrics::{Descriptor, MetricId, MetricValue, Units};
use crate::rich::{Attr, RichLine};
use crate::row::{Host, RenderContext, Row, RowCore, SortValue};
use crate::widths::WidthCycle;
use std::collections::BTreeMap;

/// One metric value stamped into a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCell {
    pub metric_id: Option<MetricId>,
    pub descriptor: Option<Descriptor>,
    pub value: Option<MetricValue>,
    pub offset: usize,
    pub instance_id: i32,
}

/// A row synthesized from one instance of a metrics domain. Cells are keyed
/// by column position in the active screen.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub core: RowCore,
    fields: BTreeMap<usize, FieldCell>,
    pub offset: usize,
}

impl MetricRow {
    pub fn new(host: &Host) -> Self {
        Self {
            core: RowCore::new(host),
            fields: BTreeMap::new(),
            offset: 0,
        }
    }

    /// Appends an empty cell at the next position.
    pub fn add_field(&mut self) -> usize {
        let position = self.fields.len();
        self.fields.insert(position, FieldCell::default());
        position
    }

    /// Drops the last cell.
    pub fn remove_field(&mut self) -> Option<FieldCell> {
        let last = self.fields.len().checked_sub(1)?;
        self.fields.remove(&last)
    }

    pub fn remove_all_fields(&mut self) {
        self.fields.clear();
    }

    pub fn fields_count(&self) -> usize {
        self.fields.len()
    }

    pub fn cell(&self, position: usize) -> Option<&FieldCell> {
        self.fields.get(&position)
    }

    pub fn cell_mut(&mut self, position: usize) -> Option<&mut FieldCell> {
        self.fields.get_mut(&position)
    }

    fn cell_for(&self, field: RowField, fields: &[RowField]) -> Option<&FieldCell> {
        let position = fields.iter().position(|f| *f == field)?;
        self.cell(position)
    }
}

/// Renders a cell at its natural width, trailing separator included.
fn render_value(cell: Option<&FieldCell>, coloring: bool) -> RichLine {
    let mut out = RichLine::new();
    let (Some(value), Some(descriptor)) = (
        cell.and_then(|c| c.value.as_ref()),
        cell.and_then(|c| c.descriptor.as_ref()),
    ) else {
        out.append(Attr::Shadow, "N/A ");
        return out;
    };
    if let MetricValue::Str(text) = value {
        out.append(Attr::Normal, &format!("{text} "));
        return out;
    }
    let unsigned = value.as_u64();
    let float = value.as_f64().unwrap_or(0.0);
    match (descriptor.units, unsigned) {
        (Units::Bytes, Some(v)) => print_bytes(&mut out, v, coloring),
        (Units::Kbytes, Some(v)) => print_kbytes(&mut out, v, coloring),
        (Units::Count, Some(v)) => print_count(&mut out, v, coloring),
        (Units::Hundredths, Some(v)) => print_time(&mut out, v, coloring),
        (Units::Rate, _) => print_rate(&mut out, float, coloring),
        (Units::Percent, _) => {
            let (text, attr) = print_percentage(float as f32, 5);
            out.append(if coloring { attr } else { Attr::Normal }, &text);
        }
        _ => {
            let text = match value {
                MetricValue::Float(_) | MetricValue::Double(_) => format!("{float:.2} "),
                MetricValue::I32(v) => format!("{v} "),
                MetricValue::I64(v) => format!("{v} "),
                MetricValue::U32(v) => format!("{v} "),
                MetricValue::U64(v) => format!("{v} "),
                MetricValue::Str(v) => format!("{v} "),
            };
            out.append(Attr::Normal, &text);
        }
    }
    out
}

fn append_aligned(out: &mut RichLine, mut cell: RichLine, width: usize, left: bool) {
    cell.rewind(1);
    let pad = " ".repeat(width.saturating_sub(cell.len()));
    if !left {
        out.append(Attr::Normal, &pad);
    }
    for segment in cell.segments() {
        out.append(segment.attr, &segment.text);
    }
    if left {
        out.append(Attr::Normal, &pad);
    }
    out.append(Attr::Normal, " ");
}

impl Row for MetricRow {
    fn core(&self) -> &RowCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RowCore {
        &mut self.core
    }

    fn write_field(&self, out: &mut RichLine, field: RowField, ctx: &RenderContext<'_>) {
        let Some(column) = ctx.columns.resolve(field) else {
            if field == RowField::PID {
                out.append(
                    Attr::Normal,
                    &format!("{:>w$} ", self.core.id, w = ctx.widths.pid_digits()),
                );
            }
            return;
        };
        let width = dynamic_width(column.width, &column.heading, field, ctx.widths);
        let cell = render_value(self.cell_for(field, ctx.fields), ctx.host.coloring);
        append_aligned(out, cell, width, column.width < 0);
    }

    fn sort_value(&self, field: RowField, fields: &[RowField]) -> SortValue {
        match self.cell_for(field, fields).and_then(|cell| cell.value.as_ref()) {
            Some(MetricValue::I32(v)) => SortValue::Int(i64::from(*v)),
            Some(MetricValue::I64(v)) => SortValue::Int(*v),
            Some(MetricValue::U32(v)) => SortValue::Uint(u64::from(*v)),
            Some(MetricValue::U64(v)) => SortValue::Uint(*v),
            Some(MetricValue::Float(v)) => SortValue::Float(f64::from(*v)),
            Some(MetricValue::Double(v)) => SortValue::Float(*v),
            Some(MetricValue::Str(v)) => SortValue::Text(v.clone()),
            None => SortValue::Missing,
        }
    }

    fn sort_key_string(&self) -> String {
        self.fields
            .values()
            .find_map(|cell| match &cell.value {
                Some(MetricValue::Str(text)) => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn observe_widths(&self, fields: &[RowField], cycle: &mut WidthCycle) {
        for (position, field) in fields.iter().enumerate() {
            if field.is_dynamic() {
                let natural = render_value(self.cell(position), false).len();
                cycle.update(*field, natural.saturating_sub(1));
            }
        }
    }
}
