use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, value::RawValue};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::subscription::{
    ProviderEventLog, ProviderWrite, ProviderWriteOutcome, SubscriptionRepo,
};
use crate::{
    app_error::{AppError, AppResult},
    application::ports::webhook_verifier::{WebhookHeaders, WebhookVerifier},
    domain::entities::{
        checkout::CheckoutCustomData,
        execution_mode::ExecutionMode,
        paypal_event::{PaypalEventType, Transition},
        subscription::{PlanType, Subscription, SubscriptionStatus},
    },
};

/// The parts of a PayPal notification envelope we read.
#[derive(Debug, Clone, Deserialize)]
pub struct PaypalEnvelope {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub resource: Value,
}

impl PaypalEnvelope {
    fn resource_str(&self, key: &str) -> Option<&str> {
        self.resource.get(key).and_then(Value::as_str)
    }

    /// `custom_id`, then legacy `custom`, then the first purchase unit's `custom_id`.
    pub fn custom_payload(&self) -> Option<&str> {
        self.resource_str("custom_id")
            .or_else(|| self.resource_str("custom"))
            .or_else(|| {
                self.resource
                    .get("purchase_units")
                    .and_then(|units| units.get(0))
                    .and_then(|unit| unit.get("custom_id"))
                    .and_then(Value::as_str)
            })
            .filter(|s| !s.trim().is_empty())
    }

    /// PayPal subscription id (`I-...`). Sale events carry it as `billing_agreement_id`.
    pub fn provider_subscription_id(&self) -> Option<&str> {
        self.resource_str("billing_agreement_id")
            .or_else(|| self.resource_str("id").filter(|id| id.starts_with("I-")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied { status: SubscriptionStatus },
    Duplicate,
    Ignored,
    /// Validated and mapped; nothing was written.
    DryRun { status: SubscriptionStatus },
}

impl WebhookOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, WebhookOutcome::Applied { .. })
    }

    pub fn status(&self) -> Option<SubscriptionStatus> {
        match self {
            WebhookOutcome::Applied { status } | WebhookOutcome::DryRun { status } => Some(*status),
            WebhookOutcome::Duplicate | WebhookOutcome::Ignored => None,
        }
    }
}

#[derive(Clone)]
pub struct PaypalWebhookUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    verifier: Arc<dyn WebhookVerifier>,
    mode: ExecutionMode,
    fallback_user_id: Option<Uuid>,
}

impl PaypalWebhookUseCases {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        verifier: Arc<dyn WebhookVerifier>,
        mode: ExecutionMode,
        fallback_user_id: Option<Uuid>,
    ) -> Self {
        Self {
            repo,
            verifier,
            mode,
            fallback_user_id,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    #[instrument(skip(self, headers, body), fields(mode = %self.mode))]
    pub async fn handle(
        &self,
        headers: Option<WebhookHeaders>,
        body: &str,
        now: DateTime<Utc>,
    ) -> AppResult<WebhookOutcome> {
        let delivered: &RawValue = serde_json::from_str(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;
        let raw: Value = serde_json::from_str(delivered.get())
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;

        if self.mode.verifies_signatures() {
            let headers = headers.ok_or(AppError::InvalidSignature)?;
            if !self.verifier.verify(&headers, delivered).await? {
                warn!(transmission_id = %headers.transmission_id, "PayPal rejected webhook signature");
                return Err(AppError::InvalidSignature);
            }
        }

        let envelope: PaypalEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook envelope: {}", e)))?;

        let Ok(event_type) = envelope.event_type.parse::<PaypalEventType>() else {
            info!(event_id = %envelope.id, event_type = %envelope.event_type, "Ignoring unhandled PayPal event");
            return Ok(WebhookOutcome::Ignored);
        };
        let Some(transition) = event_type.transition(envelope.resource_str("status")) else {
            info!(
                event_id = %envelope.id,
                event_type = %envelope.event_type,
                resource_status = ?envelope.resource_str("status"),
                "PayPal event carries no status change"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let custom = self.custom_data(&envelope)?;

        if self.repo.is_event_recorded(&envelope.id).await? {
            info!(event_id = %envelope.id, "PayPal event already processed");
            return Ok(WebhookOutcome::Duplicate);
        }

        let existing = self.repo.get_by_user(custom.user_id).await?;
        let write = plan_write(transition, existing.as_ref(), &custom, &envelope, raw, now);

        if !self.mode.persists_writes() {
            info!(
                event_id = %envelope.id,
                user_id = %custom.user_id,
                status = %write.status,
                "Dry run: webhook mapped, nothing written"
            );
            return Ok(WebhookOutcome::DryRun {
                status: write.status,
            });
        }

        match self.repo.apply_provider_write(&write).await? {
            ProviderWriteOutcome::Applied(record) => {
                info!(
                    event_id = %envelope.id,
                    event_type = %event_type,
                    user_id = %record.user_id,
                    previous_status = ?write.event.previous_status,
                    status = %record.status,
                    "Applied PayPal subscription event"
                );
                Ok(WebhookOutcome::Applied {
                    status: record.status,
                })
            }
            ProviderWriteOutcome::Duplicate => {
                info!(event_id = %envelope.id, "PayPal event recorded concurrently");
                Ok(WebhookOutcome::Duplicate)
            }
        }
    }

    fn custom_data(&self, envelope: &PaypalEnvelope) -> AppResult<CheckoutCustomData> {
        let parsed = match envelope.custom_payload() {
            Some(raw) => CheckoutCustomData::parse(raw),
            None => Err(AppError::InvalidInput("Missing custom_id payload".into())),
        };

        match (parsed, self.fallback_user()) {
            (Ok(data), _) => Ok(data),
            (Err(e), Some(user_id)) => {
                warn!(event_id = %envelope.id, error = %e, %user_id, "Using sandbox fallback user");
                Ok(CheckoutCustomData {
                    user_id,
                    plan_type: PlanType::Monthly,
                })
            }
            (Err(e), None) => Err(e),
        }
    }

    fn fallback_user(&self) -> Option<Uuid> {
        self.fallback_user_id
            .filter(|_| self.mode.allows_fallback_user())
    }
}

/// Compute the full target state for a user's record from one event.
fn plan_write(
    transition: Transition,
    existing: Option<&Subscription>,
    custom: &CheckoutCustomData,
    envelope: &PaypalEnvelope,
    metadata: Value,
    now: DateTime<Utc>,
) -> ProviderWrite {
    let kept_start = existing.and_then(|s| s.current_period_start);
    let kept_end = existing.and_then(|s| s.current_period_end);

    let (start, end) = match transition {
        Transition::Activate { renewal } => {
            let still_running = existing.is_some_and(|s| {
                s.status == SubscriptionStatus::Active
                    && s.plan_type == custom.plan_type
                    && s.current_period_end.is_none_or(|end| end > now)
            });
            if still_running && !renewal {
                (kept_start, kept_end)
            } else {
                (Some(now), Some(custom.plan_type.period_end(now)))
            }
        }
        Transition::Cancel => (kept_start, None),
        Transition::Expire => (kept_start, kept_end),
    };

    ProviderWrite {
        user_id: custom.user_id,
        plan_type: custom.plan_type,
        status: transition.target_status(),
        current_period_start: start,
        current_period_end: end,
        provider_subscription_id: envelope
            .provider_subscription_id()
            .map(str::to_string)
            .or_else(|| existing.and_then(|s| s.provider_subscription_id.clone())),
        event: ProviderEventLog {
            provider_event_id: envelope.id.clone(),
            event_type: envelope.event_type.clone(),
            previous_status: existing.map(|s| s.status),
            metadata,
        },
    }
}
