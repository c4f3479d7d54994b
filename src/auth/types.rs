// Session domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated principal as issued by the identity provider.
///
/// The gateway holds a read-only copy for the lifetime of the session;
/// the provider owns the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Account role, fixed at profile creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// Dashboard destination for this role after a successful sign-in.
    pub fn destination(self) -> Destination {
        match self {
            Role::Student => Destination::StudentDashboard,
            Role::Teacher => Destination::TeacherDashboard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Application-level user record, keyed by the identity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

impl Profile {
    /// Merge a partial update into this profile.
    ///
    /// `id`, `email`, and `role` are not mutable through this path.
    pub fn apply(&self, patch: &ProfilePatch) -> Profile {
        Profile {
            id: self.id,
            name: patch.name.clone().unwrap_or_else(|| self.name.clone()),
            email: self.email.clone(),
            role: self.role,
            avatar_url: patch.avatar_url.clone().or_else(|| self.avatar_url.clone()),
            bio: patch.bio.clone().or_else(|| self.bio.clone()),
        }
    }
}

/// Partial profile update accepted from the profile editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar_url.is_none() && self.bio.is_none()
    }
}

/// The current (identity, profile) pair.
///
/// Both halves are always present; the profile is fetched keyed by the
/// identity id before a session is constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub identity: Identity,
    pub profile: Profile,
}

/// Auth manager state machine.
///
/// `Uninitialized -> Loading -> {Anonymous, Authenticated}` at startup,
/// then between `Anonymous` and `Authenticated` for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Loading,
    Anonymous,
    Authenticated(Session),
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated(_))
    }

    /// True once bootstrap has completed, one way or the other.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionStatus::Anonymous | SessionStatus::Authenticated(_)
        )
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionStatus::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Uninitialized => "uninitialized",
            SessionStatus::Loading => "loading",
            SessionStatus::Anonymous => "anonymous",
            SessionStatus::Authenticated(_) => "authenticated",
        }
    }
}

/// Provider-emitted session change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Navigation intent signalled after a successful sign-in or sign-out.
///
/// The gateway never navigates; the front end consumes these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Home,
    StudentDashboard,
    TeacherDashboard,
}

impl Destination {
    pub fn path(self) -> &'static str {
        match self {
            Destination::Home => "/",
            Destination::StudentDashboard => "/student-dashboard",
            Destination::TeacherDashboard => "/teacher-dashboard",
        }
    }
}
