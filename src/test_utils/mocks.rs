//! In-memory implementations of repository and port traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::value::RawValue;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::webhook_verifier::{WebhookHeaders, WebhookVerifier},
        use_cases::{
            subscription::{ProviderWrite, ProviderWriteOutcome, SubscriptionRepo},
            user::{EmailSender, UserRepo},
        },
    },
    domain::entities::subscription::{
        ChangeOp, PlanType, Subscription, SubscriptionChange, SubscriptionStatus,
    },
    infra::{rate_limit::RateLimiterTrait, realtime::ChangeHub},
};

// ============================================================================
// InMemoryUserRepo
// ============================================================================

struct MagicLinkEntry {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    consumed: bool,
}

#[derive(Default)]
pub struct InMemoryUserRepo {
    users: Mutex<HashMap<Uuid, String>>,
    links: Mutex<HashMap<String, MagicLinkEntry>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: Uuid, email: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(user_id, email.to_string());
        self
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Uuid> {
        let mut users = self.users.lock().unwrap();
        if let Some((id, _)) = users.iter().find(|(_, e)| e.as_str() == email) {
            return Ok(*id);
        }
        let id = Uuid::new_v4();
        users.insert(id, email.to_string());
        Ok(id)
    }

    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn delete_user(&self, user_id: Uuid) -> AppResult<()> {
        self.users.lock().unwrap().remove(&user_id);
        self.links
            .lock()
            .unwrap()
            .retain(|_, link| link.user_id != user_id);
        Ok(())
    }

    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.links.lock().unwrap().insert(
            token_hash.to_string(),
            MagicLinkEntry {
                user_id,
                expires_at,
                consumed: false,
            },
        );
        Ok(())
    }

    async fn consume_magic_link(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>> {
        let mut links = self.links.lock().unwrap();
        match links.get_mut(token_hash) {
            Some(link) if !link.consumed && link.expires_at > now => {
                link.consumed = true;
                Ok(Some(link.user_id))
            }
            _ => Ok(None),
        }
    }
}

// ============================================================================
// RecordingEmailSender
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

/// Mirrors the Postgres repo: one row per user, `updated_at` bumped on every
/// write, and (optionally) a change published for each insert or update the
/// way the table trigger does.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    events: Mutex<HashSet<String>>,
    last_version: Mutex<Option<DateTime<Utc>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    hub: Option<ChangeHub>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let map = subscriptions
            .into_iter()
            .map(|s| (s.user_id, s))
            .collect();
        Self {
            subscriptions: Mutex::new(map),
            ..Self::default()
        }
    }

    pub fn with_change_hub(mut self, hub: ChangeHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Make every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, user_id: Uuid) -> Option<Subscription> {
        self.subscriptions.lock().unwrap().get(&user_id).cloned()
    }

    pub fn count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Successful writes since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("connection reset".into()));
        }
        Ok(())
    }

    /// Strictly increasing timestamp, like `now()` across separate transactions.
    fn next_version(&self) -> DateTime<Utc> {
        let mut last = self.last_version.lock().unwrap();
        let now = Utc::now();
        let next = match *last {
            Some(prev) if prev >= now => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    fn committed(&self, op: ChangeOp, record: &Subscription) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(hub) = &self.hub {
            hub.publish(SubscriptionChange {
                op,
                record: record.clone(),
            });
        }
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.get(user_id))
    }

    async fn create_trial_if_absent(
        &self,
        user_id: Uuid,
        trial_start: DateTime<Utc>,
        trial_end: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        self.check_writable()?;
        let record = {
            let mut subs = self.subscriptions.lock().unwrap();
            if let Some(existing) = subs.get(&user_id) {
                return Ok(existing.clone());
            }
            let version = self.next_version();
            let record = Subscription {
                id: Uuid::new_v4(),
                user_id,
                status: SubscriptionStatus::Trial,
                plan_type: PlanType::Monthly,
                trial_start_date: Some(trial_start),
                trial_end_date: Some(trial_end),
                current_period_start: None,
                current_period_end: None,
                provider_subscription_id: None,
                created_at: version,
                updated_at: version,
            };
            subs.insert(user_id, record.clone());
            record
        };
        self.committed(ChangeOp::Insert, &record);
        Ok(record)
    }

    async fn expire_if_unchanged(
        &self,
        user_id: Uuid,
        observed_updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Subscription>> {
        self.check_writable()?;
        let updated = {
            let mut subs = self.subscriptions.lock().unwrap();
            let Some(record) = subs.get_mut(&user_id) else {
                return Ok(None);
            };
            let guard_matches = record.status == SubscriptionStatus::Active
                && record.updated_at == observed_updated_at
                && record.current_period_end.is_some_and(|end| end <= now);
            if !guard_matches {
                return Ok(None);
            }
            record.status = SubscriptionStatus::Expired;
            record.updated_at = self.next_version();
            record.clone()
        };
        self.committed(ChangeOp::Update, &updated);
        Ok(Some(updated))
    }

    async fn list_elapsed_active(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.status == SubscriptionStatus::Active
                    && s.current_period_end.is_some_and(|end| end <= now)
            })
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn is_event_recorded(&self, provider_event_id: &str) -> AppResult<bool> {
        Ok(self.events.lock().unwrap().contains(provider_event_id))
    }

    async fn apply_provider_write(&self, write: &ProviderWrite) -> AppResult<ProviderWriteOutcome> {
        self.check_writable()?;
        let (op, record) = {
            let mut events = self.events.lock().unwrap();
            if events.contains(&write.event.provider_event_id) {
                return Ok(ProviderWriteOutcome::Duplicate);
            }
            let mut subs = self.subscriptions.lock().unwrap();
            let version = self.next_version();
            let (op, record) = match subs.get_mut(&write.user_id) {
                Some(existing) => {
                    existing.status = write.status;
                    existing.plan_type = write.plan_type;
                    existing.current_period_start = write.current_period_start;
                    existing.current_period_end = write.current_period_end;
                    existing.provider_subscription_id = write.provider_subscription_id.clone();
                    existing.updated_at = version;
                    (ChangeOp::Update, existing.clone())
                }
                None => {
                    let record = Subscription {
                        id: Uuid::new_v4(),
                        user_id: write.user_id,
                        status: write.status,
                        plan_type: write.plan_type,
                        trial_start_date: None,
                        trial_end_date: None,
                        current_period_start: write.current_period_start,
                        current_period_end: write.current_period_end,
                        provider_subscription_id: write.provider_subscription_id.clone(),
                        created_at: version,
                        updated_at: version,
                    };
                    subs.insert(write.user_id, record.clone());
                    (ChangeOp::Insert, record)
                }
            };
            events.insert(write.event.provider_event_id.clone());
            (op, record)
        };
        self.committed(op, &record);
        Ok(ProviderWriteOutcome::Applied(record))
    }
}

// ============================================================================
// StubWebhookVerifier
// ============================================================================

pub struct StubWebhookVerifier {
    accept: bool,
    calls: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl StubWebhookVerifier {
    pub fn accepting() -> Self {
        Self::answering(true)
    }

    pub fn rejecting() -> Self {
        Self::answering(false)
    }

    fn answering(accept: bool) -> Self {
        Self {
            accept,
            calls: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Event bodies handed to `verify`, as received.
    pub fn verified_events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookVerifier for StubWebhookVerifier {
    async fn verify(&self, _headers: &WebhookHeaders, event: &RawValue) -> AppResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(event.get().to_string());
        Ok(self.accept)
    }
}

// ============================================================================
// InMemoryRateLimiter
// ============================================================================

pub struct InMemoryRateLimiter {
    counts: Mutex<HashMap<String, u64>>,
    max_per_ip: u64,
    max_per_email: u64,
}

impl InMemoryRateLimiter {
    pub fn new(max_per_ip: u64, max_per_email: u64) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            max_per_ip,
            max_per_email,
        }
    }

    /// Never blocks.
    pub fn permissive() -> Self {
        Self::new(u64::MAX, u64::MAX)
    }
}

#[async_trait]
impl RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut counts = self.counts.lock().unwrap();

        let ip_count = counts.entry(format!("rate:ip:{ip}")).or_insert(0);
        *ip_count += 1;
        if *ip_count > self.max_per_ip {
            return Err(AppError::RateLimited);
        }

        if let Some(email) = email {
            let email_count = counts
                .entry(format!("rate:email:{}", email.to_lowercase()))
                .or_insert(0);
            *email_count += 1;
            if *email_count > self.max_per_email {
                return Err(AppError::RateLimited);
            }
        }

        Ok(())
    }
}
