use crate::errors::RowscopeError;
use crate::screen_settings::SortDirection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest accepted screen name, in bytes.
pub const MAX_SCREEN_NAME_BYTES: usize = 31;

/// A named, user-defined table layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicScreen {
    pub name: String,
    pub heading: String,
    pub caption: String,
    /// Whitespace separated column names, in display order.
    pub fields: String,
    pub sort_key: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScreenConfig {
    pub name: String,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    pub fields: String,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub direction: Option<SortDirection>,
}

/// Registry of dynamic screens keyed by insertion sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicScreens {
    entries: BTreeMap<u32, DynamicScreen>,
    next_key: u32,
}

impl DynamicScreens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[ScreenConfig]) -> Result<Self, RowscopeError> {
        let mut screens = Self::new();
        for config in configs {
            let sort_key = match &config.sort_key {
                Some(key) => key.clone(),
                None => config
                    .fields
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            };
            screens.insert(DynamicScreen {
                name: config.name.clone(),
                heading: config.heading.clone().unwrap_or_default(),
                caption: config.caption.clone().unwrap_or_default(),
                fields: config.fields.clone(),
                sort_key,
                direction: config.direction.unwrap_or_default(),
            })?;
        }
        Ok(screens)
    }

    /// Adds a screen and returns its key. An empty heading falls back to the
    /// name.
    pub fn insert(&mut self, mut screen: DynamicScreen) -> Result<u32, RowscopeError> {
        validate_screen_name(&screen.name)?;
        if self.lookup_by_name(&screen.name).is_some() {
            return Err(RowscopeError::DuplicateScreen(screen.name));
        }
        if screen.heading.is_empty() {
            screen.heading = screen.name.clone();
        }
        let key = self.next_key;
        self.entries.insert(key, screen);
        self.next_key += 1;
        Ok(key)
    }

    /// First screen, in key order, whose name matches exactly.
    pub fn lookup_by_name(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(_, screen)| screen.name == name)
            .map(|(key, _)| *key)
    }

    pub fn lookup_name_by_key(&self, key: u32) -> Option<&str> {
        self.entries.get(&key).map(|screen| screen.name.as_str())
    }

    pub fn get(&self, key: u32) -> Option<&DynamicScreen> {
        self.entries.get(&key)
    }

    pub fn by_name(&self, name: &str) -> Option<&DynamicScreen> {
        self.lookup_by_name(name).and_then(|key| self.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &DynamicScreen)> {
        self.entries.iter().map(|(key, screen)| (*key, screen))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn validate_screen_name(name: &str) -> Result<(), RowscopeError> {
    if name.is_empty()
        || name.len() > MAX_SCREEN_NAME_BYTES
        || name.chars().any(char::is_whitespace)
    {
        return Err(RowscopeError::InvalidScreenName(name.to_string()));
    }
    Ok(())
}
