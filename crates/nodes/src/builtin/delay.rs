use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_config;
use crate::{NodeContext, NodeError, NodeExecutor, NodeOutcome};

/// Config of a `delay` node: exactly one of `durationMs` or `until`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

impl DelayConfig {
    fn deadline(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        match (self.duration_ms, self.until) {
            (Some(ms), None) => i64::try_from(ms)
                .ok()
                .and_then(TimeDelta::try_milliseconds)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or_else(|| format!("durationMs {ms} is out of range")),
            (None, Some(until)) => Ok(until),
            (Some(_), Some(_)) => Err("set either durationMs or until, not both".into()),
            (None, None) => Err("delay needs durationMs or until".into()),
        }
    }
}

/// Suspends its branch until a wall-clock deadline.
///
/// The node itself returns immediately with [`NodeOutcome::Suspend`]; the
/// scheduler parks it on its timer wheel, so other branches keep running
/// and no worker slot is held while waiting.
#[derive(Debug, Default)]
pub struct DelayNode;

#[async_trait]
impl NodeExecutor for DelayNode {
    fn validate_config(&self, config: &Value) -> Result<(), String> {
        parse_config::<DelayConfig>(config)?.deadline(Utc::now()).map(|_| ())
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutcome, NodeError> {
        let config: DelayConfig = parse_config(&ctx.config).map_err(NodeError::InvalidConfig)?;
        let until = config.deadline(Utc::now()).map_err(NodeError::InvalidConfig)?;
        Ok(NodeOutcome::Suspend { until })
    }
}
