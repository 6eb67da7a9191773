//! Status-change detector (§4.8): given a newly inserted result, decides
//! whether the transition warrants a notification and, if so, builds and
//! dispatches it.

use crate::contract::Status;
use crate::web::dispatch::Dispatcher;
use crate::web::sinks::{Notification, Priority};

fn priority_for(old_status: Option<Status>, new_status: Status) -> Priority {
    match new_status {
        Status::Critical => Priority::Urgent,
        Status::Warning => Priority::High,
        Status::Ok if old_status.is_some_and(|s| s != Status::Ok) => Priority::Normal,
        _ => Priority::Normal,
    }
}

/// Runs the detector for the config that just received `new_status`.
/// No-ops when the owning watcher is paused, the config has no channels,
/// or the previous status matches the new one — matching §4.8 exactly.
///
/// Takes the same transaction the caller inserted the triggering result
/// in, so the "previous result" lookup below sees a consistent view and
/// a failure here rolls back the insert too (§4.7's ingestion atomicity
/// requirement).
pub async fn evaluate(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    dispatcher: &Dispatcher,
    config: &crate::db::models::ProbeConfigRow,
    new_status: Status,
) -> crate::error::Result<()> {
    let channel_ids = config.channel_ids();
    if channel_ids.is_empty() {
        return Ok(());
    }

    if let Some(watcher_id) = config.watcher_id {
        if let Some(watcher) = crate::db::watchers::find_by_id(&mut **tx, watcher_id).await? {
            if watcher.paused {
                return Ok(());
            }
        }
    }

    // offset 1: the result just inserted is offset 0.
    let previous = crate::db::results::nth_most_recent(&mut **tx, config.id, 1).await?;
    let old_status = previous
        .as_ref()
        .and_then(|r| r.status.parse::<Status>().ok());

    if old_status == Some(new_status) {
        return Ok(());
    }

    let message = match old_status {
        Some(old) => format!("{} transitioned from {old} to {new_status}", config.name),
        None => format!("{} is {new_status}", config.name),
    };

    let notification = Notification {
        probe_name: config.name.clone(),
        old_status,
        new_status,
        message,
        priority: priority_for(old_status, new_status),
    };

    dispatcher.dispatch(&channel_ids, notification).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_is_urgent_warning_is_high_recovery_is_normal() {
        assert_eq!(priority_for(Some(Status::Warning), Status::Critical), Priority::Urgent);
        assert_eq!(priority_for(Some(Status::Ok), Status::Warning), Priority::High);
        assert_eq!(priority_for(Some(Status::Critical), Status::Ok), Priority::Normal);
    }
}
