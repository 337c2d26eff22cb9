use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 后端统计信息
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BackendStats {
    pub key_count: Option<u64>,
    pub memory_used_bytes: Option<u64>,
    pub memory_human: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// 健康检查汇总
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub connected: bool,
    pub smoke_test_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}
