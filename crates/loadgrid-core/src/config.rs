//! cluster.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{Algorithm, TaskSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub algorithm: Algorithm,
    /// Number of hosts to start.
    pub hosts: usize,
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Upper bound on the time between two run-loop iterations while a
    /// task is in flight.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_tick_ms() -> u64 {
    10
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl ClusterConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClusterConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Workload sorted by arrival offset, ties in file order.
    pub fn workload(&self) -> Vec<TaskSpec> {
        let mut tasks = self.tasks.clone();
        tasks.sort_by_key(|t| t.arrival_ms);
        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_minimal() {
        let toml_str = r#"
algorithm = "ROUND_ROBIN"
hosts = 3
"#;
        let config: ClusterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.algorithm, Algorithm::RoundRobin);
        assert_eq!(config.hosts, 3);
        assert_eq!(config.host, HostSettings::default());
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn parse_kebab_algorithm_and_tasks() {
        let toml_str = r#"
algorithm = "least-work-left"
hosts = 2

[host]
tick_ms = 2

[[tasks]]
id = 1
priority = 3
size = "short"
duration_ms = 100
arrival_ms = 20

[[tasks]]
id = 2
size = "long"
duration_ms = 900
preemptible = false
"#;
        let config: ClusterConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.algorithm, Algorithm::LeastWorkLeft);
        assert_eq!(config.host.tick_ms, 2);
        assert_eq!(config.tasks.len(), 2);
        assert!(config.tasks[0].preemptible);
        assert_eq!(config.tasks[1].priority, 0);
        assert!(!config.tasks[1].preemptible);

        let order: Vec<u64> = config.workload().iter().map(|t| t.id).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn unknown_algorithm_fails_to_parse() {
        let toml_str = r#"
algorithm = "RANDOM"
hosts = 3
"#;
        assert!(toml::from_str::<ClusterConfig>(toml_str).is_err());
    }

    #[test]
    fn algorithm_names_match_the_command_line() {
        for (name, expected) in [
            ("round_robin", Algorithm::RoundRobin),
            ("Shortest-Queue", Algorithm::ShortestQueue),
            ("size-interval", Algorithm::SizeIntervalTaskAssignment),
            ("LEAST_WORK_LEFT", Algorithm::LeastWorkLeft),
        ] {
            let toml_str = format!("algorithm = \"{name}\"\nhosts = 3\n");
            let config: ClusterConfig = toml::from_str(&toml_str).unwrap();
            assert_eq!(config.algorithm, expected);
            assert_eq!(name.parse::<Algorithm>().unwrap(), expected);
        }
    }

    #[test]
    fn from_file_round_trip() {
        let config = ClusterConfig {
            algorithm: Algorithm::SizeIntervalTaskAssignment,
            hosts: 3,
            host: HostSettings { tick_ms: 5 },
            tasks: vec![TaskSpec {
                id: 1,
                priority: 2,
                size: "MEDIUM".to_string(),
                duration_ms: 40,
                preemptible: true,
                arrival_ms: 0,
            }],
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = ClusterConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.algorithm, Algorithm::SizeIntervalTaskAssignment);
        assert_eq!(loaded.host.tick_ms, 5);
        assert_eq!(loaded.tasks, config.tasks);
    }

    #[test]
    fn from_file_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClusterConfig::from_file(&dir.path().join("cluster.toml")).is_err());
    }
}
