//! Recorded metric samples played back one frame per refresh cycle.

use crate::errors::RowscopeError;
use crate::metrics::{DomainId, InMemoryMetrics, MetricType, MetricValue, Units};
use crate::process_row::ProcessRecord;
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    /// Domain id to instance ids, in offset order.
    #[serde(default)]
    pub domains: BTreeMap<u32, Vec<i32>>,
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
    #[serde(default)]
    pub processes: Vec<ProcessRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricType,
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub domain: Option<u32>,
    /// Instance id to value.
    #[serde(default)]
    pub values: BTreeMap<i32, serde_json::Value>,
}

pub fn load_snapshot(fs: &dyn FileSystem, path: &Path) -> Result<Snapshot, RowscopeError> {
    let text = fs.read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&text)
        .map_err(|e| RowscopeError::Snapshot(format!("{}: {e}", path.display())))?;
    if snapshot.frames.is_empty() {
        return Err(RowscopeError::Snapshot(format!(
            "{}: no frames recorded",
            path.display()
        )));
    }
    Ok(snapshot)
}

impl Snapshot {
    /// Frame for a refresh cycle; the last frame repeats once playback runs out.
    pub fn frame(&self, cycle: usize) -> Option<&Frame> {
        self.frames
            .get(cycle)
            .or_else(|| self.frames.last())
    }
}

impl Frame {
    /// Replaces the backend's domains and values with this frame's.
    /// Returns a note for every value that does not fit its declared type.
    pub fn apply(&self, backend: &mut InMemoryMetrics) -> Vec<String> {
        for domain in backend.domains() {
            if !self.domains.contains_key(&domain.0) {
                backend.remove_domain(domain);
            }
        }
        for (domain, instances) in &self.domains {
            backend.set_instances(DomainId(*domain), instances);
        }

        backend.clear_all_values();
        let mut rejected = Vec::new();
        for sample in &self.metrics {
            let id = backend.register(
                &sample.name,
                sample.kind,
                sample.units,
                sample.domain.map(DomainId),
            );
            for (instance, raw) in &sample.values {
                match MetricValue::from_json(sample.kind, raw) {
                    Some(value) => backend.set_value(id, *instance, value),
                    None => rejected.push(format!("{}[{instance}]: {raw}", sample.name)),
                }
            }
        }
        rejected
    }
}
