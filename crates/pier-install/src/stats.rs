//! The dependency size report surfaced on completion.

use std::collections::BTreeMap;

/// Sizes of everything the run emitted, split into direct installs and
/// shared chunks, with deltas against the previous run where one existed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyStats {
    pub direct: Vec<DependencyStatsEntry>,
    pub common: Vec<DependencyStatsEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyStatsEntry {
    /// Output-relative file name, forward slashes.
    pub file_name: String,
    pub size: u64,
    /// Byte change against the previous run's file of the same name.
    pub delta: Option<i64>,
}

impl DependencyStats {
    /// Build the report from emitted `(file name, size)` pairs and the sizes
    /// captured from the previous output directory before it was removed.
    pub fn from_outputs(
        outputs: impl IntoIterator<Item = (String, u64)>,
        previous: &BTreeMap<String, u64>,
    ) -> Self {
        let mut stats = DependencyStats::default();
        for (file_name, size) in outputs {
            let delta = previous
                .get(&file_name)
                .map(|&before| size as i64 - before as i64);
            let entry = DependencyStatsEntry {
                file_name: file_name.clone(),
                size,
                delta,
            };
            if file_name.starts_with("common/") {
                stats.common.push(entry);
            } else {
                stats.direct.push(entry);
            }
        }
        stats.direct.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        stats.common.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        stats
    }

    pub fn total_size(&self) -> u64 {
        self.direct
            .iter()
            .chain(self.common.iter())
            .map(|e| e.size)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_direct_and_common() {
        let stats = DependencyStats::from_outputs(
            [
                ("react.js".to_string(), 100),
                ("common/scheduler-abc.js".to_string(), 40),
            ],
            &BTreeMap::new(),
        );
        assert_eq!(stats.direct.len(), 1);
        assert_eq!(stats.common.len(), 1);
        assert_eq!(stats.total_size(), 140);
    }

    #[test]
    fn deltas_compare_against_previous_run() {
        let previous = BTreeMap::from([("react.js".to_string(), 90_u64)]);
        let stats =
            DependencyStats::from_outputs([("react.js".to_string(), 100)], &previous);
        assert_eq!(stats.direct[0].delta, Some(10));

        let fresh = DependencyStats::from_outputs([("new.js".to_string(), 5)], &previous);
        assert_eq!(fresh.direct[0].delta, None);
    }
}
