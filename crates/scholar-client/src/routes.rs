use std::fmt;

use scholar_types::SessionUser;

use crate::signup::{SignupContext, SignupStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Signup,
    VerifyEmail,
    SetPassword,
    CompleteProfile,
    Home,
    Profile,
    Results,
    Payments,
    Messages,
    Announcements,
    Mentorship,
    Settings,
}

impl Route {
    pub const ALL: [Route; 13] = [
        Route::Login,
        Route::Signup,
        Route::VerifyEmail,
        Route::SetPassword,
        Route::CompleteProfile,
        Route::Home,
        Route::Profile,
        Route::Results,
        Route::Payments,
        Route::Messages,
        Route::Announcements,
        Route::Mentorship,
        Route::Settings,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::VerifyEmail => "/verify-email",
            Route::SetPassword => "/set-password",
            Route::CompleteProfile => "/complete-profile",
            Route::Home => "/",
            Route::Profile => "/profile",
            Route::Results => "/results",
            Route::Payments => "/payments",
            Route::Messages => "/messaging/chats",
            Route::Announcements => "/messaging/announcements",
            Route::Mentorship => "/mentorship",
            Route::Settings => "/settings",
        }
    }

    /// Resolve a path. `/messaging` lands on announcements and anything
    /// unknown falls back to home.
    pub fn from_path(path: &str) -> Route {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            p => p,
        };
        if path == "/messaging" {
            return Route::Announcements;
        }
        Route::ALL
            .into_iter()
            .find(|r| r.path() == path)
            .unwrap_or(Route::Home)
    }

    /// Needs a signed-in user.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::Profile
                | Route::Results
                | Route::Payments
                | Route::Messages
                | Route::Announcements
                | Route::Mentorship
                | Route::Settings
        )
    }

    /// Signup steps that only make sense once an email has been verified.
    pub fn needs_verified_email(&self) -> bool {
        matches!(self, Route::SetPassword | Route::CompleteProfile)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(Route),
}

/// Decide whether `route` may be shown.
pub fn guard(
    route: Route,
    session: Option<&SessionUser>,
    signup: Option<&SignupContext>,
) -> Access {
    if route == Route::Home {
        return Access::Redirect(if session.is_some() {
            Route::Profile
        } else {
            Route::Login
        });
    }

    if route.needs_verified_email() {
        let verified = signup.is_some_and(|c| c.stage >= SignupStage::EmailVerified);
        if !verified {
            return Access::Redirect(Route::Signup);
        }
    }

    if route.is_protected() && session.is_none() {
        return Access::Redirect(Route::Login);
    }

    Access::Allow
}
