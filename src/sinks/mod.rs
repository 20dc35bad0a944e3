pub mod alerts;
pub mod audit;
pub mod metrics;

pub use alerts::{Alert, AlertChannel, OutboxAlertChannel};
pub use audit::{AccessStatus, AuditEntry, AuditSink, JsonlAuditLog, UNKNOWN_IDENTITY};
pub use metrics::{JsonlMetrics, Metric, MetricsSink};
