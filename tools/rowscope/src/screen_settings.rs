//! The user's list of active screens.
//!
//! Every screen is either built in (process table) or bound to an entry of
//! the dynamic screen registry by name. Editing operations keep at least one
//! screen alive and keep the selection inside the list.

use crate::columns::DynamicColumns;
use crate::errors::RowscopeError;
use crate::fields::RowField;
use crate::row::SortSpec;
use crate::screens::{DynamicScreen, DynamicScreens};
use serde::{Deserialize, Serialize};

/// Longest screen heading accepted by [`Settings::rename`].
pub const SCREEN_NAME_LEN: usize = 20;

pub const MAIN_SCREEN_FIELDS: &str =
    "PID USER PRIORITY NICE M_RESIDENT STATE PERCENT_CPU PERCENT_MEM TIME Command";
pub const IO_SCREEN_FIELDS: &str = "PID USER IO_RATE Command";
pub const NEW_SCREEN_FIELDS: &str = "PID Command";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSettings {
    pub heading: String,
    /// Name of the dynamic screen this layout belongs to; `None` for the
    /// built-in process screens.
    pub dynamic: Option<String>,
    pub fields: Vec<RowField>,
    /// Configured field names that matched no column.
    pub unresolved: Vec<String>,
    pub sort_key: RowField,
    pub direction: SortDirection,
    pub tree_view: bool,
}

impl ScreenSettings {
    pub fn builtin(
        heading: &str,
        fields: &str,
        sort_key: RowField,
        direction: SortDirection,
        columns: &DynamicColumns,
    ) -> Self {
        Self {
            heading: heading.to_string(),
            dynamic: None,
            fields: Self::parse_fields(fields, columns),
            unresolved: Vec::new(),
            sort_key,
            direction,
            tree_view: false,
        }
    }

    /// Resolves a whitespace separated column list. Unknown names are skipped.
    pub fn parse_fields(text: &str, columns: &DynamicColumns) -> Vec<RowField> {
        RowField::parse_list(text, columns).0
    }

    /// Layout for a registry screen. The sort key falls back to the first
    /// column when it does not name one of the screen's columns. Names that
    /// match no column are kept in `unresolved` and fail the next scan.
    pub fn from_dynamic(screen: &DynamicScreen, columns: &DynamicColumns) -> Self {
        let (fields, unresolved) = RowField::parse_list(&screen.fields, columns);
        let sort_key = RowField::from_name(&screen.sort_key, columns)
            .filter(|key| fields.contains(key))
            .or_else(|| fields.first().copied())
            .unwrap_or(RowField::NULL);
        Self {
            heading: screen.heading.clone(),
            dynamic: Some(screen.name.clone()),
            fields,
            unresolved,
            sort_key,
            direction: screen.direction,
            tree_view: false,
        }
    }

    pub fn active_sort(&self) -> SortSpec {
        SortSpec {
            key: self.sort_key,
            direction: self.direction,
            tree_view: self.tree_view,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub screens: Vec<ScreenSettings>,
    pub active: usize,
}

impl Settings {
    /// "Main" and "I/O" followed by one screen per registry entry.
    pub fn with_defaults(registry: &DynamicScreens, columns: &DynamicColumns) -> Self {
        let mut screens = vec![
            ScreenSettings::builtin(
                "Main",
                MAIN_SCREEN_FIELDS,
                RowField::PERCENT_CPU,
                SortDirection::Descending,
                columns,
            ),
            ScreenSettings::builtin(
                "I/O",
                IO_SCREEN_FIELDS,
                RowField::IO_RATE,
                SortDirection::Descending,
                columns,
            ),
        ];
        screens.extend(
            registry
                .iter()
                .map(|(_, screen)| ScreenSettings::from_dynamic(screen, columns)),
        );
        Self { screens, active: 0 }
    }

    pub fn active(&self) -> Option<&ScreenSettings> {
        self.screens.get(self.active)
    }

    pub fn active_mut(&mut self) -> Option<&mut ScreenSettings> {
        self.screens.get_mut(self.active)
    }

    /// Inserts a blank process screen after `after` and selects it.
    pub fn add_new_screen(&mut self, after: usize, columns: &DynamicColumns) -> usize {
        let at = (after + 1).min(self.screens.len());
        self.screens.insert(
            at,
            ScreenSettings::builtin(
                "New",
                NEW_SCREEN_FIELDS,
                RowField::PID,
                SortDirection::Ascending,
                columns,
            ),
        );
        self.active = at;
        at
    }

    /// Appends the layout of a registry screen and selects it.
    pub fn add_dynamic_screen(
        &mut self,
        registry: &DynamicScreens,
        name: &str,
        columns: &DynamicColumns,
    ) -> Result<usize, RowscopeError> {
        let screen = registry
            .by_name(name)
            .ok_or_else(|| RowscopeError::ScreenConfig(format!("unknown screen {name}")))?;
        self.screens.push(ScreenSettings::from_dynamic(screen, columns));
        self.active = self.screens.len() - 1;
        Ok(self.active)
    }

    /// Keeps printable ASCII other than `=`, up to [`SCREEN_NAME_LEN`]
    /// characters. A name with nothing left leaves the heading unchanged.
    pub fn rename(&mut self, index: usize, name: &str) -> bool {
        let cleaned = name
            .chars()
            .filter(|c| (' '..='~').contains(c) && *c != '=')
            .take(SCREEN_NAME_LEN)
            .collect::<String>();
        match self.screens.get_mut(index) {
            Some(screen) if !cleaned.trim().is_empty() => {
                screen.heading = cleaned;
                true
            }
            _ => false,
        }
    }

    pub fn move_up(&mut self, index: usize) -> usize {
        if index == 0 || index >= self.screens.len() {
            return index;
        }
        self.screens.swap(index, index - 1);
        self.follow_swap(index, index - 1);
        index - 1
    }

    pub fn move_down(&mut self, index: usize) -> usize {
        if index + 1 >= self.screens.len() {
            return index;
        }
        self.screens.swap(index, index + 1);
        self.follow_swap(index, index + 1);
        index + 1
    }

    fn follow_swap(&mut self, from: usize, to: usize) {
        if self.active == from {
            self.active = to;
        } else if self.active == to {
            self.active = from;
        }
    }

    /// Removes a screen unless it is the last one.
    pub fn remove(&mut self, index: usize) -> Option<ScreenSettings> {
        if self.screens.len() <= 1 || index >= self.screens.len() {
            return None;
        }
        let removed = self.screens.remove(index);
        if self.active > index {
            self.active -= 1;
        }
        self.active = self.rebuild_selection(self.active);
        Some(removed)
    }

    /// Clamps a selection into the current list.
    pub fn rebuild_selection(&self, selected: usize) -> usize {
        selected.min(self.screens.len().saturating_sub(1))
    }

    /// Screens belonging to one dynamic screen, or the built-in screens for
    /// `None`.
    pub fn screens_for(&self, dynamic: Option<&str>) -> Vec<&ScreenSettings> {
        self.screens
            .iter()
            .filter(|screen| screen.dynamic.as_deref() == dynamic)
            .collect()
    }

    /// Selects the first screen bound to `name`, or failing that the first
    /// whose heading matches.
    pub fn select_by_name(&mut self, name: &str) -> Option<usize> {
        let index = self
            .screens
            .iter()
            .position(|screen| screen.dynamic.as_deref() == Some(name))
            .or_else(|| self.screens.iter().position(|screen| screen.heading == name))?;
        self.active = index;
        Some(index)
    }
}

/// Labels for the "available screens" list: the process table first, then
/// every registry screen.
pub fn available_screens(registry: &DynamicScreens) -> Vec<String> {
    let mut names = vec!["Processes".to_string()];
    names.extend(registry.iter().map(|(_, screen)| {
        if screen.heading.is_empty() {
            screen.name.clone()
        } else {
            screen.heading.clone()
        }
    }));
    names
}
