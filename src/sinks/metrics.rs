use crate::common::{GateError, Result};
use crate::sinks::audit::AccessStatus;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const ACCESS_ATTEMPTS: &str = "AccessAttempts";
pub const EMPLOYEE_REGISTRATIONS: &str = "EmployeeRegistrations";

/// Count metrics emitted by the pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Access(AccessStatus),
    Registration,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Access(_) => ACCESS_ATTEMPTS,
            Metric::Registration => EMPLOYEE_REGISTRATIONS,
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            Metric::Access(status) => Some(status.as_str()),
            Metric::Registration => None,
        }
    }
}

pub trait MetricsSink: Send + Sync {
    fn emit(&self, metric: Metric) -> Result<()>;
}

#[derive(Serialize)]
struct MetricDatum<'a> {
    namespace: &'a str,
    metric_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a str>,
    value: u32,
    unit: &'a str,
    timestamp: String,
}

/// Writes one JSON datum per metric to `<logs_dir>/metrics.jsonl`.
pub struct JsonlMetrics {
    namespace: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlMetrics {
    pub fn open(logs_dir: &Path, namespace: &str) -> Result<Self> {
        fs::create_dir_all(logs_dir)?;
        Ok(Self {
            namespace: namespace.to_string(),
            path: logs_dir.join("metrics.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonlMetrics {
    fn emit(&self, metric: Metric) -> Result<()> {
        let datum = MetricDatum {
            namespace: &self.namespace,
            metric_name: metric.name(),
            outcome: metric.label(),
            value: 1,
            unit: "Count",
            timestamp: Utc::now().to_rfc3339(),
        };
        let mut line = serde_json::to_string(&datum)?;
        line.push('\n');

        let _guard = self.write_lock
            .lock()
            .map_err(|_| GateError::Storage("Metrics lock poisoned".into()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;

        tracing::debug!("metric {}{}", metric.name(), metric.label().map(|l| format!("[{}]", l)).unwrap_or_default());
        Ok(())
    }
}
