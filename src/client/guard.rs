use crate::models::user::{UserProfile, UserRole};

/// What the client knows about the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    Authenticated { role: UserRole },
}

impl From<&UserProfile> for Session {
    fn from(p: &UserProfile) -> Self {
        Session::Authenticated { role: p.role }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed,
    RedirectToLogin,
    Forbidden,
}

/// Decides whether a role-gated view may render for a session.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: Vec<UserRole>,
}

impl RoleGuard {
    /// Only the listed roles pass.
    pub fn new(allowed: impl IntoIterator<Item = UserRole>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// `minimum` and every role above it pass.
    pub fn at_least(minimum: UserRole) -> Self {
        Self::new(
            [UserRole::Member, UserRole::Editor, UserRole::Admin, UserRole::SuperAdmin]
                .into_iter()
                .filter(|r| r.at_least(minimum)),
        )
    }

    pub fn check(&self, session: &Session) -> GuardOutcome {
        match session {
            Session::Anonymous => GuardOutcome::RedirectToLogin,
            Session::Authenticated { role } if self.allowed.contains(role) => GuardOutcome::Allowed,
            Session::Authenticated { .. } => GuardOutcome::Forbidden,
        }
    }

    /// Render `content` only when the guard allows it.
    pub fn render<T>(&self, session: &Session, content: impl FnOnce() -> T) -> Option<T> {
        (self.check(session) == GuardOutcome::Allowed).then(content)
    }
}
