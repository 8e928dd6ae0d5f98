use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::crypto::aes::SecureKey;
use crate::crypto::{codec, pin};
use crate::error::{AppError, Result};
use crate::models::document::{ClassRecord, Document};
use crate::models::session::AuthSession;
use crate::models::share::{
    ClassShare, IssuedPin, PinEntry, ShareSnapshot, ShareStatus, VisibilityPolicy,
};
use crate::models::store::StoreData;
use crate::repositories::share as share_repo;
use crate::services::data as data_service;
use crate::state::AppState;

/// Longest share lifetime an owner may request (one year).
pub const MAX_SHARE_HOURS: i64 = 8760;

/// Result of creating a share. The cleartext PINs are never retrievable again.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedShare {
    pub share_token: String,
    pub expires_at: DateTime<Utc>,
    pub pins: Vec<IssuedPin>,
}

/// Fields an owner may change on an existing share.
#[derive(Debug, Clone, Default)]
pub struct ShareUpdate {
    pub visibility: Option<VisibilityPolicy>,
    pub expires_hours: Option<i64>,
}

/// What a document write did to the account's shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub deactivated: usize,
}

/// What a share sweep removed or deactivated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,
    pub deactivated: usize,
}

fn validate_expires_hours(hours: i64) -> Result<i64> {
    if !(0..=MAX_SHARE_HOURS).contains(&hours) {
        return Err(AppError::Validation(format!(
            "expires_hours must be between 0 and {}",
            MAX_SHARE_HOURS
        )));
    }
    Ok(hours)
}

/// Draws one PIN per student and hashes them off the async runtime.
///
/// Returns the cleartext PINs for the owner and the hashed entries for the store.
async fn issue_pins(
    state: &AppState,
    class: &ClassRecord,
) -> Result<(Vec<IssuedPin>, BTreeMap<String, PinEntry>)> {
    let students: Vec<(String, String)> = class
        .students
        .iter()
        .map(|student| (student.id.clone(), student.name.clone()))
        .collect();
    let hasher = state.pin_hasher;

    tokio::task::spawn_blocking(move || -> Result<_> {
        let pins = pin::generate_unique_pins(students.len())?;

        let mut issued = Vec::with_capacity(students.len());
        let mut entries = BTreeMap::new();
        for ((student_id, name), pin) in students.into_iter().zip(pins) {
            entries.insert(
                student_id.clone(),
                PinEntry {
                    pin_hash: hasher.hash(&pin)?,
                    name: name.clone(),
                },
            );
            issued.push(IssuedPin {
                student_id,
                student_name: name,
                pin,
            });
        }
        Ok((issued, entries))
    })
    .await?
}

/// Creates a share for one class and returns the cleartext PINs once.
///
/// Fails with a conflict if a live share already exists for the class; expired or
/// revoked records for the class are replaced.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `session` - The caller's session.
/// * `class_id` - The class to share.
/// * `expires_hours` - Requested lifetime; the configured default when absent.
/// * `visibility` - What students may see.
///
/// # Returns
///
/// A `CreatedShare` or an error `AppError`.
pub async fn create_share(
    state: &AppState,
    session: &AuthSession,
    class_id: &str,
    expires_hours: Option<i64>,
    visibility: VisibilityPolicy,
) -> Result<CreatedShare> {
    let hours = validate_expires_hours(expires_hours.unwrap_or(state.config.default_share_hours))?;

    {
        let data = state.db.read().await?;
        if share_repo::find_for_class(&data, &session.account_id, class_id)
            .is_some_and(|share| share.is_live(state.now()))
        {
            return Err(AppError::Conflict("An active share already exists for this class".to_string()));
        }
    }

    let document = data_service::document_for_owner(state, session).await?;
    let class = document.find_class(class_id).ok_or(AppError::NotFound)?;

    let (pins, student_pins) = issue_pins(state, class).await?;

    let now = state.now();
    let snapshot = ShareSnapshot::build(&document, class, now);
    let encrypted_snapshot = codec::encrypt(&snapshot, &state.master_key)?;
    let expires_at = now + Duration::hours(hours);

    let share_token = state
        .db
        .update(|data| {
            if share_repo::find_for_class(data, &session.account_id, class_id)
                .is_some_and(|share| share.is_live(now))
            {
                return Err(AppError::Conflict(
                    "An active share already exists for this class".to_string(),
                ));
            }
            share_repo::remove_for_class(data, &session.account_id, class_id);

            let token = share_repo::generate_unique_token(data);
            data.class_shares.insert(
                token.clone(),
                ClassShare {
                    share_token: token.clone(),
                    account_id: session.account_id.clone(),
                    class_id: class.id.clone(),
                    class_name: class.name.clone(),
                    teacher_name: document.teacher_name.clone(),
                    created_at: now,
                    expires_at,
                    active: true,
                    revoked_at: None,
                    visibility,
                    student_pins,
                    encrypted_snapshot,
                },
            );
            Ok(token)
        })
        .await?;

    tracing::info!(
        "🔗 Share created for class {} of {} ({} PINs, {}h)",
        class_id,
        session.account_id,
        pins.len(),
        hours
    );

    Ok(CreatedShare {
        share_token,
        expires_at,
        pins,
    })
}

/// Rebuilds a share's snapshot from `document` and reconciles its PIN entries:
/// students no longer in the class lose their PIN, renamed students are renamed.
///
/// Returns false if the class no longer exists.
fn resync(
    share: &mut ClassShare,
    document: &Document,
    now: DateTime<Utc>,
    master_key: &SecureKey,
) -> Result<bool> {
    let Some(class) = document.find_class(&share.class_id) else {
        return Ok(false);
    };

    let snapshot = ShareSnapshot::build(document, class, now);
    share.encrypted_snapshot = codec::encrypt(&snapshot, master_key)?;
    share.class_name = class.name.clone();
    share.teacher_name = document.teacher_name.clone();

    share.student_pins.retain(|student_id, entry| {
        match class.students.iter().find(|student| &student.id == student_id) {
            Some(student) => {
                entry.name = student.name.clone();
                true
            }
            None => false,
        }
    });
    Ok(true)
}

/// Changes visibility and/or lifetime of a share the caller owns.
///
/// A new lifetime re-activates a share that lapsed by age; it needs the owner's
/// document so the snapshot is rebuilt before students see it again. A share
/// deactivated because its class was deleted, or whose class is gone now, is
/// reported as not found.
pub async fn update_share(
    state: &AppState,
    session: &AuthSession,
    share_token: &str,
    update: ShareUpdate,
) -> Result<ShareStatus> {
    let hours = update.expires_hours.map(validate_expires_hours).transpose()?;

    {
        let data = state.db.read().await?;
        share_repo::find_owned(&data, share_token, &session.account_id)?;
    }

    let document = if hours.is_some()
        || state.vault.get_key_for_session(&session.token).await.is_some()
    {
        Some(data_service::document_for_owner(state, session).await?)
    } else {
        None
    };

    let now = state.now();
    let status = state
        .db
        .update(|data| {
            let share = share_repo::find_owned_mut(data, share_token, &session.account_id)?;

            // inactive before its expiry means the class was deleted
            if !share.active && !share.is_expired(now) {
                return Err(AppError::NotFound);
            }
            if let Some(document) = &document {
                if !resync(share, document, now, &state.master_key)? {
                    tracing::info!("Class {} no longer exists, share not updated", share.class_id);
                    return Err(AppError::NotFound);
                }
            }

            if let Some(visibility) = update.visibility {
                share.visibility = visibility;
            }
            if let Some(hours) = hours {
                share.expires_at = now + Duration::hours(hours);
                if !share.active {
                    tracing::info!("♻️ Share {} re-activated", share.class_id);
                }
                share.active = true;
            }
            Ok(ShareStatus::of(share))
        })
        .await?;

    tracing::info!("✏️ Share updated by {}", session.account_id);
    Ok(status)
}

/// Revokes a share the caller owns.
///
/// PIN entries and the snapshot are deleted at once; the record stays as an
/// inactive tombstone until the next sweep so students are told access was revoked.
pub async fn revoke_share(state: &AppState, session: &AuthSession, share_token: &str) -> Result<()> {
    let now = state.now();
    let class_id = state
        .db
        .update(|data| {
            let share = share_repo::find_owned_mut(data, share_token, &session.account_id)?;
            share.active = false;
            share.revoked_at = Some(now);
            share.student_pins.clear();
            share.encrypted_snapshot.clear();
            Ok(share.class_id.clone())
        })
        .await?;

    tracing::info!("🚫 Share for class {} revoked by {}", class_id, session.account_id);
    Ok(())
}

/// Issues new PINs for every current student of an active share, replacing all
/// previous PINs at once.
pub async fn regenerate_pins(
    state: &AppState,
    session: &AuthSession,
    share_token: &str,
) -> Result<Vec<IssuedPin>> {
    let class_id = {
        let data = state.db.read().await?;
        let share = share_repo::find_owned(&data, share_token, &session.account_id)?;
        if !share.is_live(state.now()) {
            return Err(AppError::Validation("Share is not active".to_string()));
        }
        share.class_id.clone()
    };

    let document = data_service::document_for_owner(state, session).await?;
    let class = document.find_class(&class_id).ok_or(AppError::NotFound)?;

    let (pins, student_pins) = issue_pins(state, class).await?;

    let now = state.now();
    let encrypted_snapshot = codec::encrypt(&ShareSnapshot::build(&document, class, now), &state.master_key)?;

    state
        .db
        .update(|data| {
            let share = share_repo::find_owned_mut(data, share_token, &session.account_id)?;
            if !share.is_live(now) {
                return Err(AppError::Validation("Share is not active".to_string()));
            }
            share.student_pins = student_pins;
            share.encrypted_snapshot = encrypted_snapshot;
            share.class_name = class.name.clone();
            share.teacher_name = document.teacher_name.clone();
            Ok(())
        })
        .await?;

    tracing::info!("🔁 {} PINs regenerated for class {}", pins.len(), class_id);
    Ok(pins)
}

/// Re-syncs every active share of the account after a document write.
///
/// Runs inside the same store mutation as the write. Expired shares and shares
/// whose class disappeared are deactivated.
pub fn sync_on_write(
    data: &mut StoreData,
    account_id: &str,
    document: &Document,
    now: DateTime<Utc>,
    master_key: &SecureKey,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for share in data
        .class_shares
        .values_mut()
        .filter(|share| share.account_id == account_id && share.active)
    {
        if share.is_expired(now) {
            share.active = false;
            report.deactivated += 1;
            continue;
        }

        if resync(share, document, now, master_key)? {
            report.synced += 1;
        } else {
            tracing::info!("Class {} no longer exists, share deactivated", share.class_id);
            share.active = false;
            report.deactivated += 1;
        }
    }

    Ok(report)
}

/// Reports whether the class has a live share. An expired record found here is
/// deleted on the spot.
pub async fn get_status(state: &AppState, session: &AuthSession, class_id: &str) -> Result<ShareStatus> {
    let now = state.now();
    let data = state.db.read().await?;

    let Some(share) = share_repo::find_for_class(&data, &session.account_id, class_id) else {
        return Ok(ShareStatus::none());
    };

    if share.is_live(now) {
        return Ok(ShareStatus::of(share));
    }

    if share.is_expired(now) {
        let token = share.share_token.clone();
        state
            .db
            .update(|data| {
                if data
                    .class_shares
                    .get(&token)
                    .is_some_and(|share| share.is_expired(now) && !share.is_live(now))
                {
                    data.class_shares.remove(&token);
                }
                Ok(())
            })
            .await?;
        tracing::debug!("🧹 Expired share for class {} removed", class_id);
    }

    Ok(ShareStatus::none())
}

/// Applies the share lifecycle to the whole store.
///
/// Inactive shares are deleted; active shares past expiry plus `grace` are
/// deleted; active shares past expiry are deactivated.
pub fn sweep_in(data: &mut StoreData, now: DateTime<Utc>, grace: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    data.class_shares.retain(|_, share| {
        if !share.active || now >= share.expires_at + grace {
            report.deleted += 1;
            return false;
        }
        if share.is_expired(now) {
            share.active = false;
            report.deactivated += 1;
        }
        true
    });

    report
}

/// Runs [`sweep_in`] against the store, skipping the save when nothing changes.
pub async fn sweep_shares(state: &AppState) -> Result<SweepReport> {
    let now = state.now();
    let grace = state.config.share_grace();

    let pending = state
        .db
        .read()
        .await?
        .class_shares
        .values()
        .any(|share| !share.active || share.is_expired(now));
    if !pending {
        return Ok(SweepReport::default());
    }

    let report = state.db.update(|data| Ok(sweep_in(data, now, grace))).await?;
    if report.deleted > 0 || report.deactivated > 0 {
        tracing::info!(
            "🧹 Share sweep: {} deleted, {} deactivated",
            report.deleted,
            report.deactivated
        );
    }
    Ok(report)
}
