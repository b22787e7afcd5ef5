//! The row primitive shared by every kind of table entry.
//!
//! [`RowCore`] holds the identity, tree and display state that the generic
//! list manipulates. Concrete kinds (processes, metric instances) embed a
//! core and implement [`Row`] for their own rendering, filtering and sort
//! keys; anything they leave out falls back to the trait defaults.

use crate::columns::DynamicColumns;
use crate::fields::RowField;
use crate::rich::{Attr, RichLine};
use crate::runtime::Clock;
use crate::screen_settings::SortDirection;
use crate::widths::{FieldWidths, WidthCycle};
use std::cmp::Ordering;
use std::time::UNIX_EPOCH;

/// Quasi-global state rows read while being created and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Host {
    pub now_ms: u64,
    pub highlight_delay_ms: u64,
    pub highlight_changes: bool,
    pub coloring: bool,
}

impl Host {
    pub fn new(now_ms: u64, highlight_delay_secs: u64) -> Self {
        Self {
            now_ms,
            highlight_delay_ms: highlight_delay_secs.saturating_mul(1000),
            highlight_changes: true,
            coloring: true,
        }
    }

    pub fn from_clock(clock: &dyn Clock, highlight_delay_secs: u64) -> Self {
        let now_ms = clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::new(now_ms, highlight_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCore {
    pub id: i32,
    pub uid: Option<u32>,
    pub group: i32,
    pub parent: i32,
    /// Has no known parent.
    pub is_root: bool,
    pub tag: bool,
    pub show: bool,
    pub was_shown: bool,
    pub show_children: bool,
    pub updated: bool,
    /// Bit `l` is set when the ancestor (or self) at depth `l + 1` has a
    /// later sibling; drives the branch glyphs in tree mode.
    pub indent: i32,
    pub tree_depth: u32,
    pub seen_stamp_ms: u64,
    pub tomb_stamp_ms: u64,
}

impl RowCore {
    /// A fresh row: tree and tag state cleared, `id` left for the caller.
    /// `show` and `show_children` start set so a row added between rebuilds
    /// is visible and expanded; the next rebuild overwrites both.
    pub fn new(host: &Host) -> Self {
        Self {
            id: 0,
            uid: None,
            group: 0,
            parent: 0,
            is_root: false,
            tag: false,
            show: true,
            was_shown: false,
            show_children: true,
            updated: false,
            indent: 0,
            tree_depth: 0,
            seen_stamp_ms: host.now_ms,
            tomb_stamp_ms: 0,
        }
    }

    /// The group leader for members of a group, the structural parent for
    /// the leader itself.
    pub fn effective_parent(&self) -> i32 {
        if self.group == self.id {
            self.parent
        } else {
            self.group
        }
    }

    pub fn is_child_of(&self, id: i32) -> bool {
        self.effective_parent() == id
    }

    pub fn is_new(&self, host: &Host) -> bool {
        host.now_ms.saturating_sub(self.seen_stamp_ms) <= host.highlight_delay_ms
    }

    pub fn is_tomb(&self, host: &Host) -> bool {
        self.tomb_stamp_ms > 0
            && host.now_ms.saturating_sub(self.tomb_stamp_ms) <= host.highlight_delay_ms
    }

    pub fn mark_tomb(&mut self, host: &Host) {
        self.tomb_stamp_ms = host.now_ms.max(1);
    }

    pub fn toggle_tag(&mut self) {
        self.tag = !self.tag;
    }

    /// Branch glyphs drawn in front of the name column in tree mode.
    pub fn tree_prefix(&self) -> String {
        if self.tree_depth == 0 {
            return String::new();
        }
        let own = self.tree_depth - 1;
        let mut prefix = String::new();
        for level in 0..own {
            prefix.push_str(if self.has_later_sibling_at(level) { "│ " } else { "  " });
        }
        prefix.push_str(if self.has_later_sibling_at(own) { "├─ " } else { "└─ " });
        prefix
    }

    fn has_later_sibling_at(&self, level: u32) -> bool {
        level < MAX_INDENT_LEVELS && self.indent & (1 << level) != 0
    }
}

/// Tree levels that carry a branch bit in [`RowCore::indent`].
pub const MAX_INDENT_LEVELS: u32 = 30;

/// Orderable projection of a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Missing,
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Int(_) | Self::Uint(_) | Self::Float(_) => 1,
            Self::Text(_) => 2,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Uint(a), Self::Uint(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Missing, Self::Missing) => Ordering::Equal,
            (a, b) if a.rank() == 1 && b.rank() == 1 => a.as_f64().total_cmp(&b.as_f64()),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Uint(v) => *v as f64,
            Self::Float(v) => *v,
            Self::Missing | Self::Text(_) => 0.0,
        }
    }
}

/// Row filters currently set by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    pub text: Option<String>,
    pub user_id: Option<u32>,
    pub hide_kernel_threads: bool,
}

impl TableFilter {
    pub fn is_active(&self) -> bool {
        self.text.is_some() || self.user_id.is_some() || self.hide_kernel_threads
    }
}

/// Everything a row needs to render one line.
pub struct RenderContext<'a> {
    pub host: &'a Host,
    pub widths: &'a FieldWidths,
    pub fields: &'a [RowField],
    pub columns: &'a DynamicColumns,
    pub tree_view: bool,
}

pub trait Row {
    fn core(&self) -> &RowCore;

    fn core_mut(&mut self) -> &mut RowCore;

    fn write_field(&self, out: &mut RichLine, field: RowField, ctx: &RenderContext<'_>);

    fn is_visible(&self, _filter: &TableFilter) -> bool {
        true
    }

    /// True when the active filter hides this row.
    fn matches_filter(&self, _filter: &TableFilter) -> bool {
        false
    }

    fn sort_key_string(&self) -> String {
        String::new()
    }

    /// Value compared when sorting by `field`; `fields` is the screen's
    /// column list for kinds that store values by column position.
    fn sort_value(&self, _field: RowField, _fields: &[RowField]) -> SortValue {
        SortValue::Text(self.sort_key_string())
    }

    fn compare_by_parent(&self, other: &Self) -> Ordering
    where
        Self: Sized,
    {
        compare_by_parent_base(self, other)
    }

    /// Reports the widths this row needs into the current cycle.
    fn observe_widths(&self, _fields: &[RowField], cycle: &mut WidthCycle) {
        let core = self.core();
        cycle.observe_pid(i64::from(core.id));
        if let Some(uid) = core.uid {
            cycle.observe_uid(uid);
        }
    }

    /// Renders every configured field, then applies the tag and
    /// new/dying highlight over the whole line.
    fn display(&self, out: &mut RichLine, ctx: &RenderContext<'_>) {
        for field in ctx.fields {
            self.write_field(out, *field, ctx);
        }
        let core = self.core();
        if core.tag {
            out.set_attr(Attr::Tagged);
        }
        if ctx.host.highlight_changes {
            if core.is_tomb(ctx.host) {
                out.set_attr(Attr::Tomb);
            } else if core.is_new(ctx.host) {
                out.set_attr(Attr::New);
            }
        }
    }
}

/// Sort key used while no better ordering is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: RowField,
    pub direction: SortDirection,
    pub tree_view: bool,
}

/// Display order: the active sort field in the active direction, then `id`
/// ascending so equal keys still produce one fixed order.
pub fn compare<R: Row>(a: &R, b: &R, sort: &SortSpec, fields: &[RowField]) -> Ordering {
    let by_key = a
        .sort_value(sort.key, fields)
        .compare(&b.sort_value(sort.key, fields));
    let by_key = match sort.direction {
        SortDirection::Ascending => by_key,
        SortDirection::Descending => by_key.reverse(),
    };
    by_key.then_with(|| a.core().id.cmp(&b.core().id))
}

/// Groups rows by effective parent, then by id.
pub fn compare_by_parent_base<R: Row + ?Sized>(a: &R, b: &R) -> Ordering {
    let (a, b) = (a.core(), b.core());
    a.effective_parent()
        .cmp(&b.effective_parent())
        .then_with(|| a.id.cmp(&b.id))
}

/// Creates concrete rows without the list knowing their kind.
pub trait RowFactory<R> {
    fn create(&self, host: &Host) -> R;
}

impl<R, F> RowFactory<R> for F
where
    F: Fn(&Host) -> R,
{
    fn create(&self, host: &Host) -> R {
        self(host)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal row kind used by list tests.
    #[derive(Debug, Clone)]
    pub(crate) struct TestRow {
        pub core: RowCore,
        pub key: String,
    }

    impl TestRow {
        pub(crate) fn new(id: i32, key: &str) -> Self {
            let mut core = RowCore::new(&Host::new(0, 0));
            core.id = id;
            core.group = id;
            Self {
                core,
                key: key.to_string(),
            }
        }

        pub(crate) fn with_parent(id: i32, parent: i32, key: &str) -> Self {
            let mut row = Self::new(id, key);
            row.core.parent = parent;
            row
        }
    }

    impl Row for TestRow {
        fn core(&self) -> &RowCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut RowCore {
            &mut self.core
        }

        fn write_field(&self, out: &mut RichLine, _field: RowField, _ctx: &RenderContext<'_>) {
            out.append(Attr::Normal, &format!("{} ", self.key));
        }

        fn sort_key_string(&self) -> String {
            self.key.clone()
        }
    }

    fn spec(direction: SortDirection) -> SortSpec {
        SortSpec {
            key: RowField::COMM,
            direction,
            tree_view: false,
        }
    }

    #[test]
    fn effective_parent_follows_group_leadership() {
        let leader = TestRow::with_parent(10, 1, "a");
        assert_eq!(leader.core.effective_parent(), 1);
        assert!(leader.core.is_child_of(1));

        let mut thread = TestRow::with_parent(11, 1, "a");
        thread.core.group = 10;
        assert_eq!(thread.core.effective_parent(), 10);
        assert!(thread.core.is_child_of(10));
        assert!(!thread.core.is_child_of(1));
    }

    #[test]
    fn new_and_tomb_windows_use_host_clock() {
        let created = Host::new(10_000, 2);
        let mut core = RowCore::new(&created);
        assert!(core.is_new(&Host::new(11_500, 2)));
        assert!(!core.is_new(&Host::new(12_001, 2)));

        assert!(!core.is_tomb(&created));
        core.mark_tomb(&Host::new(20_000, 2));
        assert!(core.is_tomb(&Host::new(21_000, 2)));
        assert!(!core.is_tomb(&Host::new(23_000, 2)));
    }

    #[test]
    fn fresh_core_has_cleared_flags() {
        let core = RowCore::new(&Host::new(5, 1));
        assert!(!core.tag && !core.was_shown && !core.updated);
        assert!(!core.is_root);
        assert_eq!((core.indent, core.tree_depth), (0, 0));
        assert!(core.show && core.show_children);
        assert_eq!(core.seen_stamp_ms, 5);
        assert_eq!(core.tomb_stamp_ms, 0);
    }

    #[test]
    fn tree_prefix_draws_branches_from_indent_bits() {
        let mut core = RowCore::new(&Host::new(0, 0));
        assert_eq!(core.tree_prefix(), "");
        core.tree_depth = 1;
        core.indent = 1;
        assert_eq!(core.tree_prefix(), "├─ ");
        core.tree_depth = 3;
        core.indent = 0b001;
        assert_eq!(core.tree_prefix(), "│   └─ ");
    }

    #[test]
    fn toggle_tag_flips() {
        let mut core = RowCore::new(&Host::new(0, 0));
        core.toggle_tag();
        assert!(core.tag);
        core.toggle_tag();
        assert!(!core.tag);
    }

    #[test]
    fn compare_breaks_ties_by_id_in_both_directions() {
        let a = TestRow::new(2, "same");
        let b = TestRow::new(1, "same");
        assert_eq!(compare(&a, &b, &spec(SortDirection::Ascending), &[]), Ordering::Greater);
        assert_eq!(compare(&a, &b, &spec(SortDirection::Descending), &[]), Ordering::Greater);

        let x = TestRow::new(1, "alpha");
        let y = TestRow::new(2, "beta");
        assert_eq!(compare(&x, &y, &spec(SortDirection::Ascending), &[]), Ordering::Less);
        assert_eq!(compare(&x, &y, &spec(SortDirection::Descending), &[]), Ordering::Greater);
    }

    #[test]
    fn parent_comparator_groups_siblings() {
        let a = TestRow::with_parent(5, 1, "x");
        let b = TestRow::with_parent(3, 2, "x");
        let c = TestRow::with_parent(4, 1, "x");
        assert_eq!(a.compare_by_parent(&b), Ordering::Less);
        assert_eq!(a.compare_by_parent(&c), Ordering::Greater);
    }

    #[test]
    fn sort_values_order_numbers_before_text() {
        assert_eq!(SortValue::Int(-1).compare(&SortValue::Uint(0)), Ordering::Less);
        assert_eq!(SortValue::Float(2.5).compare(&SortValue::Int(2)), Ordering::Greater);
        assert_eq!(SortValue::Missing.compare(&SortValue::Int(0)), Ordering::Less);
        assert_eq!(SortValue::Uint(9).compare(&SortValue::Text("a".into())), Ordering::Less);
    }

    #[test]
    fn closures_act_as_row_factories() {
        let factory = |host: &Host| TestRow {
            core: RowCore::new(host),
            key: "made".to_string(),
        };
        let row = factory.create(&Host::new(77, 0));
        assert_eq!(row.core.seen_stamp_ms, 77);
    }
}
