//! The live metrics backend seam and an in-memory implementation.
//!
//! A backend groups like entities into instance domains (one instance per
//! disk, per interface, ...). Each instance has an identifier chosen by the
//! backend and an offset, its position in the domain for the current sample.
//! Offsets are what rows are keyed by.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DomainId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    I32,
    U32,
    I64,
    U64,
    Float,
    Double,
    String,
}

/// How a value should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    None,
    Bytes,
    Kbytes,
    Count,
    Hundredths,
    Rate,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub metric: MetricId,
    pub kind: MetricType,
    pub units: Units,
    pub instance_domain: Option<DomainId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl MetricValue {
    /// Converts a JSON scalar into a value of the declared type.
    pub fn from_json(kind: MetricType, value: &serde_json::Value) -> Option<Self> {
        match kind {
            MetricType::I32 => value.as_i64().and_then(|v| i32::try_from(v).ok()).map(Self::I32),
            MetricType::U32 => value.as_u64().and_then(|v| u32::try_from(v).ok()).map(Self::U32),
            MetricType::I64 => value.as_i64().map(Self::I64),
            MetricType::U64 => value.as_u64().map(Self::U64),
            MetricType::Float => value.as_f64().map(|v| Self::Float(v as f32)),
            MetricType::Double => value.as_f64().map(Self::Double),
            MetricType::String => value.as_str().map(|v| Self::Str(v.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I32(v) => Some(f64::from(*v)),
            Self::U32(v) => Some(f64::from(*v)),
            Self::I64(v) => Some(*v as f64),
            Self::U64(v) => Some(*v as f64),
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// Non-negative integer view, used by the byte/count/time renderers.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::I32(v) => u64::try_from(*v).ok(),
            Self::U32(v) => Some(u64::from(*v)),
            Self::I64(v) => u64::try_from(*v).ok(),
            Self::U64(v) => Some(*v),
            Self::Float(v) if *v >= 0.0 => Some(*v as u64),
            Self::Double(v) if *v >= 0.0 => Some(*v as u64),
            _ => None,
        }
    }
}

/// One live member of an instance domain for the current sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instance {
    pub id: i32,
    pub offset: usize,
}

pub trait MetricsBackend {
    fn lookup_metric(&self, name: &str) -> Option<MetricId>;

    /// Current size of the domain; unknown domains report zero.
    fn instance_count(&self, domain: DomainId) -> i64;

    /// Live members in backend order. Every call restarts the enumeration.
    fn instances(&self, domain: DomainId) -> Vec<Instance>;

    fn describe(&self, metric: MetricId) -> Option<Descriptor>;

    /// `None` when the metric has no value for this instance right now.
    fn fetch_value(
        &self,
        metric: MetricId,
        instance: i32,
        offset: usize,
        descriptor: &Descriptor,
    ) -> Option<MetricValue>;
}

#[derive(Debug, Clone, PartialEq)]
struct MetricRecord {
    name: String,
    descriptor: Descriptor,
    values: BTreeMap<i32, MetricValue>,
}

/// A metrics backend that serves whatever was last loaded into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryMetrics {
    metrics: Vec<MetricRecord>,
    domains: BTreeMap<DomainId, Vec<i32>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a metric, or updates the descriptor of an existing one with
    /// the same name. Ids stay stable across re-registration.
    pub fn register(
        &mut self,
        name: &str,
        kind: MetricType,
        units: Units,
        instance_domain: Option<DomainId>,
    ) -> MetricId {
        if let Some(pos) = self.metrics.iter().position(|m| m.name == name) {
            let record = &mut self.metrics[pos];
            record.descriptor.kind = kind;
            record.descriptor.units = units;
            record.descriptor.instance_domain = instance_domain;
            return record.descriptor.metric;
        }
        let metric = MetricId(self.metrics.len() as u32);
        self.metrics.push(MetricRecord {
            name: name.to_string(),
            descriptor: Descriptor {
                metric,
                kind,
                units,
                instance_domain,
            },
            values: BTreeMap::new(),
        });
        metric
    }

    /// Replaces the members of a domain; offsets follow the given order.
    pub fn set_instances(&mut self, domain: DomainId, instances: &[i32]) {
        self.domains.insert(domain, instances.to_vec());
    }

    pub fn remove_domain(&mut self, domain: DomainId) {
        self.domains.remove(&domain);
    }

    pub fn set_value(&mut self, metric: MetricId, instance: i32, value: MetricValue) {
        if let Some(record) = self.metrics.get_mut(metric.0 as usize) {
            record.values.insert(instance, value);
        }
    }

    pub fn clear_values(&mut self, metric: MetricId) {
        if let Some(record) = self.metrics.get_mut(metric.0 as usize) {
            record.values.clear();
        }
    }

    pub fn clear_all_values(&mut self) {
        for record in &mut self.metrics {
            record.values.clear();
        }
    }

    pub fn domains(&self) -> Vec<DomainId> {
        self.domains.keys().copied().collect()
    }
}

impl MetricsBackend for InMemoryMetrics {
    fn lookup_metric(&self, name: &str) -> Option<MetricId> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.descriptor.metric)
    }

    fn instance_count(&self, domain: DomainId) -> i64 {
        self.domains
            .get(&domain)
            .map_or(0, |members| members.len() as i64)
    }

    fn instances(&self, domain: DomainId) -> Vec<Instance> {
        self.domains
            .get(&domain)
            .map(|members| {
                members
                    .iter()
                    .enumerate()
                    .map(|(offset, id)| Instance { id: *id, offset })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn describe(&self, metric: MetricId) -> Option<Descriptor> {
        self.metrics
            .get(metric.0 as usize)
            .map(|m| m.descriptor.clone())
    }

    fn fetch_value(
        &self,
        metric: MetricId,
        instance: i32,
        _offset: usize,
        descriptor: &Descriptor,
    ) -> Option<MetricValue> {
        let record = self.metrics.get(metric.0 as usize)?;
        if record.descriptor.kind != descriptor.kind {
            return None;
        }
        record.values.get(&instance).cloned()
    }
}
