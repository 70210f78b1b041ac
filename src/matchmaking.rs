//! Mutual-like relay. A like either promotes an existing reciprocal pending
//! row to `matched` (both sides get the rich `user-matched` event) or records
//! a new pending row (the liked side gets an anonymized `match-created` nudge
//! — no identity revealed until they reciprocate).

use crate::db::models::UserRef;
use crate::error::GatewayError;
use crate::state::AppState;
use crate::store;
use crate::ws::broadcast::{send_event, send_to_user};
use crate::ws::events::{CreateUserMatchPayload, ServerEvent};
use crate::ws::ConnectionSender;

enum MatchOutcome {
    Promoted { me: UserRef, counterpart: UserRef },
    Pending,
    AlreadyRecorded,
}

pub async fn handle_create(
    payload: CreateUserMatchPayload,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) -> Result<(), GatewayError> {
    let db = state.db.clone();
    let uid = user_id.to_string();
    let counterpart_id = payload.user_match_id.clone();

    let outcome = tokio::task::spawn_blocking(move || -> Result<_, GatewayError> {
        let conn = store::lock(&db)?;
        // Reciprocation check runs with swapped roles: did the counterpart
        // already like the caller?
        match store::matches::find_existing(&conn, &counterpart_id, &uid)? {
            Some(existing) => {
                store::matches::promote(&conn, &existing.id)?;
                let me = store::users::get(&conn, &uid)?;
                let counterpart = store::users::get(&conn, &counterpart_id)?;
                Ok(MatchOutcome::Promoted { me, counterpart })
            }
            None => {
                // Double-tap, or a re-like after the pair already matched
                if store::matches::exists_between(&conn, &uid, &counterpart_id)? {
                    Ok(MatchOutcome::AlreadyRecorded)
                } else {
                    store::matches::create_pending(&conn, &uid, &counterpart_id)?;
                    Ok(MatchOutcome::Pending)
                }
            }
        }
    })
    .await??;

    match outcome {
        MatchOutcome::Promoted { me, counterpart } => {
            tracing::info!(user = %user_id, counterpart = %payload.user_match_id, "Users matched");
            send_to_user(
                &state.connections,
                &payload.user_match_id,
                &ServerEvent::UserMatched { user_matched: me },
            );
            send_event(
                tx,
                &ServerEvent::UserMatched {
                    user_matched: counterpart,
                },
            );
        }
        MatchOutcome::Pending => {
            send_to_user(
                &state.connections,
                &payload.user_match_id,
                &ServerEvent::MatchCreated,
            );
        }
        MatchOutcome::AlreadyRecorded => {
            tracing::debug!(
                user = %user_id,
                counterpart = %payload.user_match_id,
                "Repeated like ignored"
            );
        }
    }
    Ok(())
}
