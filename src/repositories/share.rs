use crate::crypto::tokens::generate_share_token;
use crate::error::{AppError, Result};
use crate::models::{share::ClassShare, store::StoreData};

/// Finds the share record for an (account, class) pair, whatever its state.
pub fn find_for_class<'a>(
    data: &'a StoreData,
    account_id: &str,
    class_id: &str,
) -> Option<&'a ClassShare> {
    data.class_shares
        .values()
        .find(|share| share.account_id == account_id && share.class_id == class_id)
}

/// Looks up a share the caller owns.
///
/// Missing shares, revoked tombstones and shares of other accounts all map to
/// [`AppError::NotFound`] so existence is never leaked.
///
/// # Arguments
///
/// * `data` - The loaded store.
/// * `share_token` - The token from the request path.
/// * `account_id` - The caller's account.
///
/// # Returns
///
/// The share, or `AppError::NotFound`.
pub fn find_owned<'a>(data: &'a StoreData, share_token: &str, account_id: &str) -> Result<&'a ClassShare> {
    data.class_shares
        .get(share_token)
        .filter(|share| share.account_id == account_id && share.revoked_at.is_none())
        .ok_or(AppError::NotFound)
}

/// Mutable variant of [`find_owned`].
pub fn find_owned_mut<'a>(
    data: &'a mut StoreData,
    share_token: &str,
    account_id: &str,
) -> Result<&'a mut ClassShare> {
    data.class_shares
        .get_mut(share_token)
        .filter(|share| share.account_id == account_id && share.revoked_at.is_none())
        .ok_or(AppError::NotFound)
}

/// Generates a share token not used by any existing share.
pub fn generate_unique_token(data: &StoreData) -> String {
    loop {
        let token = generate_share_token();
        if !data.class_shares.contains_key(&token) {
            return token;
        }
    }
}

/// Removes every record for the pair. Returns how many were removed.
pub fn remove_for_class(data: &mut StoreData, account_id: &str, class_id: &str) -> usize {
    let before = data.class_shares.len();
    data.class_shares
        .retain(|_, share| !(share.account_id == account_id && share.class_id == class_id));
    before - data.class_shares.len()
}
