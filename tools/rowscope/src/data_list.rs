//! Owned rows plus the derived display projection.
//!
//! Rows live in an arena whose index is the row key: the list length at the
//! time the row was added. Removal only ever happens at the tail, so keys
//! stay dense and a key stays bound to the same row until that row is
//! removed. The storage order and the display list hold keys, never rows,
//! and are only changed through the methods here.

use crate::fields::{RowField, TitleSource};
use crate::rich::{Attr, RichLine};
use crate::row::{compare, RenderContext, Row, SortSpec, TableFilter, MAX_INDENT_LEVELS};
use crate::screen_settings::{ScreenSettings, SortDirection};
use crate::widths::{FieldWidths, WidthCycle};
use std::collections::BTreeMap;

pub type RowKey = usize;

pub const SORT_GLYPH_ASCENDING: &str = "▲";
pub const SORT_GLYPH_DESCENDING: &str = "▼";

#[derive(Debug, Clone)]
pub struct DataList<R> {
    rows: Vec<R>,
    order: Vec<RowKey>,
    display: Vec<RowKey>,
    needs_sort: bool,
    last_sort: Option<SortSpec>,
}

#[derive(Debug, Clone, Copy)]
struct TreeEntry {
    key: RowKey,
    depth: u32,
    indent: i32,
    is_root: bool,
    /// Every ancestor has its children unfolded.
    expanded: bool,
}

impl<R: Row> Default for DataList<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Row> DataList<R> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            order: Vec::new(),
            display: Vec::new(),
            needs_sort: true,
            last_sort: None,
        }
    }

    /// Appends a row and returns its key.
    pub fn add_row(&mut self, row: R) -> RowKey {
        let key = self.rows.len();
        self.rows.push(row);
        self.order.push(key);
        key
    }

    /// Removes the most recently added row. Calling this on an empty list is
    /// a caller bug. The display list is dropped until the next rebuild.
    pub fn remove_last_row(&mut self) -> Option<R> {
        debug_assert!(!self.rows.is_empty(), "remove_last_row on an empty list");
        let row = self.rows.pop()?;
        let key = self.rows.len();
        if self.order.last() == Some(&key) {
            self.order.pop();
        } else if let Some(position) = self.order.iter().rposition(|k| *k == key) {
            self.order.swap_remove(position);
        }
        self.display.clear();
        self.needs_sort = true;
        Some(row)
    }

    /// Empties the list, handing back every row in key order.
    pub fn take_rows(&mut self) -> Vec<R> {
        self.order.clear();
        self.display.clear();
        self.needs_sort = true;
        std::mem::take(&mut self.rows)
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: RowKey) -> Option<&R> {
        self.rows.get(key)
    }

    pub fn get_mut(&mut self, key: RowKey) -> Option<&mut R> {
        self.rows.get_mut(key)
    }

    /// Rows in storage order.
    pub fn rows(&self) -> impl Iterator<Item = (RowKey, &R)> {
        self.order.iter().map(|key| (*key, &self.rows[*key]))
    }

    /// Mutable access to every row, in key order.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut R> {
        self.rows.iter_mut()
    }

    pub fn display_keys(&self) -> &[RowKey] {
        &self.display
    }

    pub fn display_rows(&self) -> impl Iterator<Item = &R> {
        self.display.iter().map(|key| &self.rows[*key])
    }

    pub fn needs_sort(&self) -> bool {
        self.needs_sort
    }

    pub fn set_needs_sort(&mut self) {
        self.needs_sort = true;
    }

    pub fn rebuild_display_list(&mut self, screen: &ScreenSettings) {
        self.rebuild_display_list_filtered(screen, &TableFilter::default());
    }

    /// Re-sorts if anything changed since the last rebuild and repopulates
    /// the display list. Rows that are invisible, or hidden by an active
    /// filter, are left out.
    pub fn rebuild_display_list_filtered(&mut self, screen: &ScreenSettings, filter: &TableFilter) {
        let sort = screen.active_sort();
        for row in &mut self.rows {
            let core = row.core_mut();
            core.was_shown = core.show;
        }
        if sort.tree_view {
            self.build_tree(&sort, &screen.fields, filter);
        } else {
            self.build_flat(&sort, &screen.fields, filter);
        }
        self.needs_sort = false;
        self.last_sort = Some(sort);
    }

    fn build_flat(&mut self, sort: &SortSpec, fields: &[RowField], filter: &TableFilter) {
        if self.needs_sort || self.last_sort != Some(*sort) {
            let rows = &self.rows;
            self.order
                .sort_by(|a, b| compare(&rows[*a], &rows[*b], sort, fields));
        }
        self.display.clear();
        for key in &self.order {
            let row = &mut self.rows[*key];
            let core = row.core_mut();
            core.show = true;
            core.tree_depth = 0;
            core.indent = 0;
            if passes(row, filter) {
                self.display.push(*key);
            }
        }
    }

    /// Depth-first walk from the roots, siblings in active sort order.
    fn build_tree(&mut self, sort: &SortSpec, fields: &[RowField], filter: &TableFilter) {
        let rows = &self.rows;
        let mut by_sort = self.order.clone();
        by_sort.sort_by(|a, b| compare(&rows[*a], &rows[*b], sort, fields));
        self.order
            .sort_by(|a, b| rows[*a].compare_by_parent(&rows[*b]));

        let ids = rows
            .iter()
            .enumerate()
            .map(|(key, row)| (row.core().id, key))
            .collect::<BTreeMap<_, _>>();
        let mut children: BTreeMap<i32, Vec<RowKey>> = BTreeMap::new();
        let mut roots = Vec::new();
        for key in &by_sort {
            let core = rows[*key].core();
            let parent = core.effective_parent();
            if parent == core.id || !ids.contains_key(&parent) {
                roots.push(*key);
            } else {
                children.entry(parent).or_default().push(*key);
            }
        }

        let mut visited = vec![false; rows.len()];
        let mut entries = Vec::with_capacity(rows.len());
        // rows caught in a parent cycle are reached through `by_sort`
        for start in roots.iter().chain(by_sort.iter()) {
            if visited[*start] {
                continue;
            }
            let mut stack = vec![TreeEntry {
                key: *start,
                depth: 0,
                indent: 0,
                is_root: true,
                expanded: true,
            }];
            while let Some(entry) = stack.pop() {
                if visited[entry.key] {
                    continue;
                }
                visited[entry.key] = true;
                entries.push(entry);
                let core = rows[entry.key].core();
                let Some(kids) = children.get(&core.id) else {
                    continue;
                };
                let depth = entry.depth + 1;
                let expanded = entry.expanded && core.show_children;
                for (i, child) in kids.iter().enumerate().rev() {
                    let has_later = i + 1 < kids.len();
                    let bit = if has_later && depth <= MAX_INDENT_LEVELS {
                        1 << (depth - 1)
                    } else {
                        0
                    };
                    stack.push(TreeEntry {
                        key: *child,
                        depth,
                        indent: entry.indent | bit,
                        is_root: false,
                        expanded,
                    });
                }
            }
        }

        self.display.clear();
        for entry in entries {
            let row = &mut self.rows[entry.key];
            let core = row.core_mut();
            core.tree_depth = entry.depth;
            core.indent = entry.indent;
            core.is_root = entry.is_root;
            core.show = entry.expanded;
            if entry.expanded && passes(row, filter) {
                self.display.push(entry.key);
            }
        }
    }

    /// Column widths needed by the rows currently displayed.
    pub fn measure_widths(&self, fields: &[RowField]) -> FieldWidths {
        let mut cycle = WidthCycle::begin();
        for row in self.display_rows() {
            row.observe_widths(fields, &mut cycle);
        }
        cycle.finish()
    }

    /// The field whose header title covers screen column `at`.
    pub fn key_at(&self, screen: &ScreenSettings, titles: &dyn TitleSource, at: usize) -> RowField {
        let mut x = 0;
        for field in &screen.fields {
            let len = titles.aligned_title(*field).chars().count();
            if at >= x && at <= x + len {
                return *field;
            }
            x += len;
        }
        RowField::NULL
    }

    /// Renders the header line. The sort column is highlighted and followed
    /// by a direction glyph that takes the place of its trailing space.
    pub fn print_header(&self, screen: &ScreenSettings, titles: &dyn TitleSource, out: &mut RichLine) {
        for field in &screen.fields {
            let title = titles.aligned_title(*field);
            if *field != screen.sort_key {
                out.append(Attr::Normal, &title);
                continue;
            }
            out.append(Attr::HeaderFocus, &title);
            if out.last_char() == Some(' ') {
                out.rewind(1);
            }
            let glyph = match screen.direction {
                SortDirection::Ascending => SORT_GLYPH_ASCENDING,
                SortDirection::Descending => SORT_GLYPH_DESCENDING,
            };
            out.append(Attr::HeaderFocus, glyph);
        }
    }

    /// One rendered line per displayed row.
    pub fn display_lines(&self, ctx: &RenderContext<'_>) -> Vec<RichLine> {
        self.display_rows()
            .map(|row| {
                let mut line = RichLine::new();
                row.display(&mut line, ctx);
                line
            })
            .collect()
    }
}

fn passes<R: Row>(row: &R, filter: &TableFilter) -> bool {
    row.is_visible(filter) && !(filter.is_active() && row.matches_filter(filter))
}
