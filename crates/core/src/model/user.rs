use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("user name cannot be empty")]
    EmptyName,

    #[error("user email cannot be empty")]
    EmptyEmail,

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

/// Account role. Only students are considered by the risk classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }

    /// Parses the stored role string.
    ///
    /// # Errors
    ///
    /// Returns `UserError::UnknownRole` for anything outside the enumerated set.
    pub fn parse(value: &str) -> Result<Self, UserError> {
        match value {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    role: Role,
}

impl User {
    /// Creates a user after trimming and validating name and email.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyName` or `UserError::EmptyEmail`.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Result<Self, UserError> {
        let name = name.into().trim().to_owned();
        let email = email.into().trim().to_owned();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        if email.is_empty() {
            return Err(UserError::EmptyEmail);
        }
        Ok(Self {
            id,
            name,
            email,
            role,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Student, Role::Instructor, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
        assert_eq!(
            Role::parse("guest").unwrap_err(),
            UserError::UnknownRole("guest".into())
        );
    }

    #[test]
    fn user_rejects_blank_fields() {
        let err = User::new(UserId::new(1), "  ", "a@b.c", Role::Student).unwrap_err();
        assert_eq!(err, UserError::EmptyName);
        let err = User::new(UserId::new(1), "Kim", "", Role::Student).unwrap_err();
        assert_eq!(err, UserError::EmptyEmail);
    }
}
