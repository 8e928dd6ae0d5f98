use crate::crypto::{codec, pin};
use crate::error::{Result, ShareAccessError};
use crate::models::share::{ShareSnapshot, StudentView};
use crate::state::AppState;

/// Checks a student's PIN against a share and returns that student's view.
///
/// Every stored hash is checked, matched or not, so response time does not depend
/// on which entry (if any) the PIN belongs to.
pub async fn verify(state: &AppState, share_token: &str, candidate: &str) -> Result<StudentView> {
    let now = state.now();
    let share = state
        .db
        .read()
        .await?
        .class_shares
        .remove(share_token)
        .ok_or(ShareAccessError::InvalidAccessLink)?;

    if !share.active {
        // A share the sweep deactivated for age reads as expired; anything else was revoked.
        if share.revoked_at.is_none() && share.is_expired(now) {
            return Err(ShareAccessError::AccessExpired.into());
        }
        return Err(ShareAccessError::AccessRevoked.into());
    }
    if share.is_expired(now) {
        return Err(ShareAccessError::AccessExpired.into());
    }
    if !pin::is_valid_pin(candidate) {
        return Err(ShareAccessError::InvalidPin.into());
    }

    let hasher = state.pin_hasher;
    let candidate = candidate.to_string();
    let entries: Vec<(String, String)> = share
        .student_pins
        .iter()
        .map(|(student_id, entry)| (student_id.clone(), entry.pin_hash.clone()))
        .collect();

    let matched = tokio::task::spawn_blocking(move || {
        let mut matched = None;
        for (student_id, pin_hash) in entries {
            if hasher.verify(&candidate, &pin_hash) && matched.is_none() {
                matched = Some(student_id);
            }
        }
        matched
    })
    .await?;

    let Some(student_id) = matched else {
        tracing::warn!("❌ Wrong PIN for share of class {}", share.class_id);
        return Err(ShareAccessError::WrongPin.into());
    };

    let snapshot: ShareSnapshot = codec::decrypt(&share.encrypted_snapshot, &state.master_key)
        .map_err(|_| {
            tracing::warn!("⚠️  Snapshot of class {} unreadable, treating as expired", share.class_id);
            ShareAccessError::AccessExpired
        })?;

    let student = snapshot
        .find_student(&student_id)
        .ok_or(ShareAccessError::StudentNotFound)?;

    tracing::info!("🎓 Student view served for class {}", share.class_id);
    Ok(StudentView::project(&snapshot, student, share.visibility, share.expires_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::share::VisibilityPolicy;
    use crate::services::{data, shares};
    use crate::testutil::{gradebook, register_and_login, test_env};
    use chrono::Duration;

    fn access_error(result: Result<StudentView>) -> ShareAccessError {
        match result {
            Err(AppError::ShareAccess(e)) => e,
            other => panic!("expected share access error, got {:?}", other.map(|v| v.student_name)),
        }
    }

    #[tokio::test]
    async fn pin_unlocks_only_its_student() {
        let env = test_env();
        let session = register_and_login(&env.state, "berger").await;
        data::save_data(&env.state, &session, gradebook("1")).await.unwrap();

        let created = shares::create_share(&env.state, &session, "c1", Some(24), VisibilityPolicy::default())
            .await
            .unwrap();
        assert_eq!(created.pins.len(), 2);
        assert_ne!(created.pins[0].pin, created.pins[1].pin);

        for issued in &created.pins {
            let view = verify(&env.state, &created.share_token, &issued.pin).await.unwrap();
            assert_eq!(view.student_id, issued.student_id);
            assert_eq!(view.class_name, "4A");
        }
    }

    #[tokio::test]
    async fn rejections_follow_the_gate_order() {
        let env = test_env();
        let session = register_and_login(&env.state, "berger").await;
        data::save_data(&env.state, &session, gradebook("1")).await.unwrap();
        let created = shares::create_share(&env.state, &session, "c1", Some(1), VisibilityPolicy::default())
            .await
            .unwrap();
        let token = created.share_token.as_str();
        let used: Vec<&str> = created.pins.iter().map(|p| p.pin.as_str()).collect();
        let unused = (0..1_000_000)
            .map(|n| format!("{:06}", n))
            .find(|candidate| !used.contains(&candidate.as_str()))
            .unwrap();

        assert_eq!(access_error(verify(&env.state, "nope", "123456").await), ShareAccessError::InvalidAccessLink);
        assert_eq!(access_error(verify(&env.state, token, "12345").await), ShareAccessError::InvalidPin);
        assert_eq!(access_error(verify(&env.state, token, "12a456").await), ShareAccessError::InvalidPin);
        assert_eq!(access_error(verify(&env.state, token, &unused).await), ShareAccessError::WrongPin);

        env.clock.advance(Duration::hours(1));
        assert_eq!(access_error(verify(&env.state, token, used[0]).await), ShareAccessError::AccessExpired);
    }

    #[tokio::test]
    async fn snapshot_from_previous_process_reads_as_expired() {
        let env = test_env();
        let session = register_and_login(&env.state, "berger").await;
        data::save_data(&env.state, &session, gradebook("1")).await.unwrap();
        let created = shares::create_share(&env.state, &session, "c1", None, VisibilityPolicy::default())
            .await
            .unwrap();

        let mut restarted = env.state.clone();
        restarted.master_key = std::sync::Arc::new(crate::crypto::aes::generate_key());

        assert_eq!(
            access_error(verify(&restarted, &created.share_token, &created.pins[0].pin).await),
            ShareAccessError::AccessExpired
        );
    }
}
