use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{ProviderWrite, ProviderWriteOutcome, SubscriptionRepo},
    domain::entities::subscription::{Subscription, SubscriptionRow, SubscriptionStatus},
};

const SELECT_COLS: &str = r#"
    id, user_id, status, plan_type, trial_start_date, trial_end_date,
    current_period_start, current_period_end, provider_subscription_id,
    created_at, updated_at
"#;

fn into_subscription(row: SubscriptionRow) -> AppResult<Subscription> {
    let user_id = row.user_id;
    Subscription::try_from(row).inspect_err(|e| {
        tracing::error!(%user_id, error = %e, "Stored subscription row failed validation");
    })
}

/// Valid records of one elapsed-sweep page plus the keyset position of the
/// page's last row, valid or not.
fn validate_page(rows: Vec<SubscriptionRow>) -> (Vec<Subscription>, Option<(DateTime<Utc>, Uuid)>) {
    let last = rows
        .last()
        .and_then(|row| row.current_period_end.map(|end| (end, row.id)));
    let valid = rows
        .into_iter()
        .filter_map(|row| into_subscription(row).ok())
        .collect();
    (valid, last)
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(into_subscription).transpose()
    }

    async fn create_trial_if_absent(
        &self,
        user_id: Uuid,
        trial_start: DateTime<Utc>,
        trial_end: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let inserted = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"INSERT INTO subscriptions (id, user_id, status, trial_start_date, trial_end_date)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (user_id) DO NOTHING
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(SubscriptionStatus::Trial)
        .bind(trial_start)
        .bind(trial_end)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        match inserted {
            Some(row) => into_subscription(row),
            // Lost the race to another writer; return theirs.
            None => self.get_by_user(user_id).await?.ok_or(AppError::NotFound),
        }
    }

    async fn expire_if_unchanged(
        &self,
        user_id: Uuid,
        observed_updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"UPDATE subscriptions
               SET status = $2, updated_at = clock_timestamp()
               WHERE user_id = $1
                 AND status = $3
                 AND updated_at = $4
                 AND current_period_end <= $5
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(user_id)
        .bind(SubscriptionStatus::Expired)
        .bind(SubscriptionStatus::Active)
        .bind(observed_updated_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(into_subscription).transpose()
    }

    async fn list_elapsed_active(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Subscription>> {
        let Ok(limit) = usize::try_from(limit) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::with_capacity(limit);
        let mut after: Option<(DateTime<Utc>, Uuid)> = None;

        // Invalid rows are logged and skipped; paging continues past them.
        while found.len() < limit {
            let requested = limit - found.len();
            let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
                r#"SELECT {} FROM subscriptions
                   WHERE status = $1 AND current_period_end <= $2
                     AND ($4::timestamptz IS NULL OR (current_period_end, id) > ($4, $5))
                   ORDER BY current_period_end, id
                   LIMIT $3"#,
                SELECT_COLS
            ))
            .bind(SubscriptionStatus::Active)
            .bind(now)
            .bind(requested as i64)
            .bind(after.map(|(end, _)| end))
            .bind(after.map(|(_, id)| id))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;

            let fetched = rows.len();
            let (valid, last) = validate_page(rows);
            found.extend(valid);
            match last {
                Some(cursor) if fetched == requested => after = Some(cursor),
                _ => break,
            }
        }

        Ok(found)
    }

    async fn is_event_recorded(&self, provider_event_id: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subscription_events WHERE provider_event_id = $1)",
        )
        .bind(provider_event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists)
    }

    async fn apply_provider_write(&self, write: &ProviderWrite) -> AppResult<ProviderWriteOutcome> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let logged = sqlx::query(
            r#"INSERT INTO subscription_events
                   (id, provider_event_id, user_id, event_type, previous_status, new_status, metadata)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (provider_event_id) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(&write.event.provider_event_id)
        .bind(write.user_id)
        .bind(&write.event.event_type)
        .bind(write.event.previous_status)
        .bind(write.status)
        .bind(&write.event.metadata)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if logged.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::from)?;
            return Ok(ProviderWriteOutcome::Duplicate);
        }

        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"INSERT INTO subscriptions
                   (id, user_id, status, plan_type, current_period_start, current_period_end,
                    provider_subscription_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (user_id) DO UPDATE SET
                   status = EXCLUDED.status,
                   plan_type = EXCLUDED.plan_type,
                   current_period_start = EXCLUDED.current_period_start,
                   current_period_end = EXCLUDED.current_period_end,
                   provider_subscription_id = EXCLUDED.provider_subscription_id,
                   updated_at = clock_timestamp()
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(write.user_id)
        .bind(write.status)
        .bind(write.plan_type)
        .bind(write.current_period_start)
        .bind(write.current_period_end)
        .bind(&write.provider_subscription_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let record = into_subscription(row)?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(ProviderWriteOutcome::Applied(record))
    }
}
