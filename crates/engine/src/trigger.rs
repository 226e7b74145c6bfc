//! Trigger validation and the cron schedule runner.

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::WorkflowEngine;
use crate::error::TriggerError;
use crate::models::{StartRequest, Trigger, TriggerKind, TriggerType};

/// Parse a cron expression (5 fields, or 6 with seconds).
pub fn parse_cron(cron: &str) -> Result<croner::Cron, TriggerError> {
    cron.parse::<croner::Cron>()
        .map_err(|e| TriggerError::InvalidCron {
            cron: cron.to_owned(),
            message: e.to_string(),
        })
}

/// Check a trigger's type-specific settings.
pub fn validate_kind(kind: &TriggerKind) -> Result<(), TriggerError> {
    match kind {
        TriggerKind::Manual => Ok(()),
        TriggerKind::Schedule { cron } => parse_cron(cron).map(|_| ()),
        TriggerKind::Event { event } if event.trim().is_empty() => Err(TriggerError::EmptyEventName),
        TriggerKind::Event { .. } => Ok(()),
        TriggerKind::Webhook { path: Some(path) } if !path.starts_with('/') => {
            Err(TriggerError::InvalidWebhookPath(path.clone()))
        }
        TriggerKind::Webhook { .. } => Ok(()),
    }
}

/// Run a schedule trigger until `token` is cancelled, starting one execution
/// per cron occurrence.
pub(crate) async fn run_schedule(engine: WorkflowEngine, trigger: Trigger, token: CancellationToken) {
    let TriggerKind::Schedule { cron: expr } = &trigger.kind else {
        return;
    };
    let cron = match parse_cron(expr) {
        Ok(cron) => cron,
        Err(err) => {
            warn!(trigger_id = %trigger.id, "not scheduling trigger: {}", err);
            return;
        }
    };
    info!(trigger_id = %trigger.id, workflow_id = %trigger.workflow_id, cron = %expr, "schedule armed");

    let mut last_fired: Option<DateTime<Utc>> = None;
    loop {
        let now = Utc::now();
        let after = last_fired.map_or(now, |fired| now.max(fired));
        let Some(next) = cron.iter_after(after).next() else {
            warn!(trigger_id = %trigger.id, "cron expression has no future occurrence");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        debug!(trigger_id = %trigger.id, %next, "waiting for next fire");

        tokio::select! {
            _ = token.cancelled() => {
                debug!(trigger_id = %trigger.id, "schedule stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let request = StartRequest {
            workflow_id: trigger.workflow_id,
            trigger_type: TriggerType::Schedule,
            payload: json!({ "triggerId": trigger.id, "firedAt": next }),
        };
        last_fired = Some(next);
        match engine.start(request).await {
            Ok(execution) => info!(trigger_id = %trigger.id, execution_id = %execution.id, "schedule fired"),
            Err(err) => warn!(trigger_id = %trigger.id, "scheduled start failed: {}", err),
        }
    }
}
