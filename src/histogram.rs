use std::cmp::Ordering;

use ahash::AHashMap;
use serde::Serialize;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ClassStats {
    pub instance_count: u64,
    pub total_bytes: u64,
}

impl ClassStats {
    pub fn add(&mut self, instances: u64, bytes: u64) {
        self.instance_count = self.instance_count.saturating_add(instances);
        self.total_bytes = self.total_bytes.saturating_add(bytes);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramRow {
    pub class_name: String,
    pub instance_count: u64,
    pub total_bytes: u64,
}

impl HistogramRow {
    // largest first, class name breaks ties for a deterministic output
    fn report_order(&self, other: &Self) -> Ordering {
        other
            .total_bytes
            .cmp(&self.total_bytes)
            .then_with(|| other.instance_count.cmp(&self.instance_count))
            .then_with(|| self.class_name.cmp(&other.class_name))
    }
}

/// Instance count and shallow size per class name, accumulate only.
#[derive(Debug, Default)]
pub struct ClassHistogram {
    stats: AHashMap<String, ClassStats>,
}

impl ClassHistogram {
    pub fn new() -> Self {
        ClassHistogram::default()
    }

    pub fn record(&mut self, class_name: &str, instances: u64, bytes: u64) {
        if let Some(stats) = self.stats.get_mut(class_name) {
            stats.add(instances, bytes);
        } else {
            let mut stats = ClassStats::default();
            stats.add(instances, bytes);
            self.stats.insert(class_name.to_string(), stats);
        }
    }

    #[cfg(test)]
    pub fn get(&self, class_name: &str) -> Option<ClassStats> {
        self.stats.get(class_name).copied()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn total_instances(&self) -> u64 {
        self.stats
            .values()
            .fold(0, |total, s| total.saturating_add(s.instance_count))
    }

    pub fn total_bytes(&self) -> u64 {
        self.stats
            .values()
            .fold(0, |total, s| total.saturating_add(s.total_bytes))
    }

    /// Rows sorted by total bytes desc, then instance count desc, then class name asc.
    pub fn snapshot(&self) -> Vec<HistogramRow> {
        let mut rows: Vec<_> = self
            .stats
            .iter()
            .map(|(class_name, stats)| HistogramRow {
                class_name: class_name.clone(),
                instance_count: stats.instance_count,
                total_bytes: stats.total_bytes,
            })
            .collect();
        rows.sort_by(HistogramRow::report_order);
        rows
    }
}
