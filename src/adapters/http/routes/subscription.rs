use axum::{
    Json, Router,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use futures_util::{Stream, stream};
use serde::Serialize;
use tokio::sync::watch;

use super::current_user;
use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::{
        entities::subscription::{PlanType, SubscriptionStatus},
        status::AccessStatus,
    },
    use_cases::session::{SessionSnapshot, SubscriptionSession},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_subscription))
        .route("/refresh", post(refresh))
        .route("/stream", get(stream_status))
}

async fn get_subscription(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let view = app_state
        .subscription_use_cases
        .view(user_id, Utc::now())
        .await?;
    Ok(Json(view))
}

async fn refresh(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let view = app_state
        .subscription_use_cases
        .refresh(user_id, Utc::now())
        .await?;
    Ok(Json(view))
}

/// Payload of each `status` server-sent event.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct StatusEvent {
    status: Option<SubscriptionStatus>,
    plan_type: Option<PlanType>,
    access: AccessStatus,
}

impl From<&SessionSnapshot> for StatusEvent {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            status: snapshot.subscription.as_ref().map(|s| s.status),
            plan_type: snapshot.subscription.as_ref().map(|s| s.plan_type),
            access: snapshot.access,
        }
    }
}

async fn stream_status(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let user_id = current_user(&jar, &app_state)?;

    let (session, snapshots) = SubscriptionSession::start(
        user_id,
        app_state.subscription_use_cases.as_ref().clone(),
        app_state.changes.subscribe(),
        app_state.config.reconcile_interval(),
        Utc::now(),
    )
    .await;
    tokio::spawn(session.run());

    Ok(Sse::new(snapshot_events(snapshots)).keep_alive(KeepAlive::default()))
}

/// The current snapshot, then one event per change. Ends when the session stops.
fn snapshot_events(
    snapshots: watch::Receiver<SessionSnapshot>,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold((snapshots, true), |(mut rx, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let payload = StatusEvent::from(&*rx.borrow_and_update());
        let event = Event::default().event("status").json_data(payload);
        Some((event, (rx, false)))
    })
}
