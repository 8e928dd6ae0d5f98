use garde::Validate;
use serde::Deserialize;

/// The request payload for account registration.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[garde(length(min = 3, max = 50), custom(validate_username))]
    pub username: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[garde(matches(password))]
    pub password_confirm: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// The request payload for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Usernames are ASCII letters, digits and underscores.
fn validate_username(username: &str, _context: &()) -> garde::Result {
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(garde::Error::new(
            "can only contain letters, numbers and underscores",
        ));
    }
    Ok(())
}
