/// Supplies the email of the logged-in user, if any.
///
/// Implemented by the application's session layer and injected into
/// [`crate::check_in::CheckInProtocol`].
pub trait IdentityProvider: Send + Sync {
    fn current_user_email(&self) -> Option<String>;
}

/// No one is logged in; only the public check-in flow can succeed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl IdentityProvider for NoSession {
    fn current_user_email(&self) -> Option<String> {
        None
    }
}

/// A session already resolved to an email by the caller.
#[derive(Debug, Clone)]
pub struct SessionUser {
    email: String,
}

impl SessionUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

impl IdentityProvider for SessionUser {
    fn current_user_email(&self) -> Option<String> {
        let email = self.email.trim();
        (!email.is_empty()).then(|| email.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_session_email_counts_as_logged_out() {
        assert_eq!(SessionUser::new("  ").current_user_email(), None);
        assert_eq!(NoSession.current_user_email(), None);
        assert_eq!(
            SessionUser::new("alice@example.com").current_user_email().as_deref(),
            Some("alice@example.com")
        );
    }
}
