use crate::errors::RowscopeError;
use crate::fields::{RowField, ROW_DYNAMIC_FIELDS};
use crate::metrics::{DomainId, MetricId, MetricsBackend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configured mapping from a displayed column to one external metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicColumn {
    pub name: String,
    pub heading: String,
    pub caption: String,
    pub metric_name: String,
    /// Bound by [`DynamicColumns::bind`]; `None` while the metric is unknown.
    pub metric: Option<MetricId>,
    pub instance_domain: Option<DomainId>,
    /// Positive: right aligned, negative: left aligned, zero: sized by content.
    pub width: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnConfig {
    pub name: String,
    pub metric: String,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub width: i32,
}

/// Resolves configured fields to dynamic columns.
pub trait ColumnSource {
    fn resolve(&self, field: RowField) -> Option<&DynamicColumn>;

    fn instance_domain_of(&self, column: &DynamicColumn) -> Option<DomainId>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicColumns {
    by_field: BTreeMap<RowField, DynamicColumn>,
}

impl DynamicColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[ColumnConfig]) -> Result<Self, RowscopeError> {
        let mut columns = Self::new();
        for config in configs {
            columns.insert(DynamicColumn {
                name: config.name.clone(),
                heading: config.heading.clone().unwrap_or_else(|| config.name.clone()),
                caption: config.caption.clone().unwrap_or_default(),
                metric_name: config.metric.clone(),
                metric: None,
                instance_domain: None,
                width: config.width,
            })?;
        }
        Ok(columns)
    }

    /// Adds a column under the next free dynamic field id.
    pub fn insert(&mut self, column: DynamicColumn) -> Result<RowField, RowscopeError> {
        if column.name.is_empty() || column.name.chars().any(char::is_whitespace) {
            return Err(RowscopeError::InvalidConfig(format!(
                "column name {:?} must be non-empty and contain no whitespace",
                column.name
            )));
        }
        if self.field_by_name(&column.name).is_some() {
            return Err(RowscopeError::InvalidConfig(format!(
                "duplicate column name {}",
                column.name
            )));
        }
        let field = RowField(ROW_DYNAMIC_FIELDS + self.by_field.len() as u32);
        self.by_field.insert(field, column);
        Ok(field)
    }

    pub fn field_by_name(&self, name: &str) -> Option<RowField> {
        self.by_field
            .iter()
            .find(|(_, column)| column.name == name)
            .map(|(field, _)| *field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowField, &DynamicColumn)> {
        self.by_field.iter().map(|(field, column)| (*field, column))
    }

    pub fn len(&self) -> usize {
        self.by_field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }

    /// Looks every column's metric up in the backend and records its id and
    /// instance domain. Returns the names of columns whose metric is unknown.
    pub fn bind(&mut self, backend: &dyn MetricsBackend) -> Vec<String> {
        let mut unbound = Vec::new();
        for column in self.by_field.values_mut() {
            column.metric = backend.lookup_metric(&column.metric_name);
            column.instance_domain = column
                .metric
                .and_then(|metric| backend.describe(metric))
                .and_then(|descriptor| descriptor.instance_domain);
            if column.metric.is_none() {
                unbound.push(column.name.clone());
            }
        }
        unbound
    }
}

impl ColumnSource for DynamicColumns {
    fn resolve(&self, field: RowField) -> Option<&DynamicColumn> {
        self.by_field.get(&field)
    }

    fn instance_domain_of(&self, column: &DynamicColumn) -> Option<DomainId> {
        column.instance_domain
    }
}
