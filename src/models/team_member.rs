//! Team member model and the request payload used to write it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Access level of a team member.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Regular,
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Regular, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(Role::Regular),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A team member record as stored.
///
/// Timestamps are kept server-side only; the serialized form is the public
/// field set `{ id, first_name, last_name, email, phone_number, role }`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TeamMember {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}

impl TeamMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Overwrite the fields present in `changes`, leaving the rest untouched.
    pub fn apply(&mut self, changes: MemberChanges) {
        if let Some(first_name) = changes.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            self.last_name = last_name;
        }
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(phone_number) = changes.phone_number {
            self.phone_number = phone_number;
        }
        if let Some(role) = changes.role {
            self.role = role;
        }
    }
}

impl fmt::Display for TeamMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Request body for create, replace and partial update.
///
/// Every field is optional at the wire level; which ones are required is
/// decided by the validator for the write mode in use. `null` counts as absent.
/// Values are kept as raw JSON so a wrong type is reported against its field
/// alongside every other failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPayload {
    #[serde(default)]
    pub first_name: Option<Value>,
    #[serde(default)]
    pub last_name: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub phone_number: Option<Value>,
    #[serde(default)]
    pub role: Option<Value>,
}

/// Validated field values ready to be written.
///
/// `None` means "leave unchanged"; for creates every field is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<Role>,
}

/// A fully validated record that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTeamMember {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
}

impl NewTeamMember {
    /// Build from changes produced by a create validation.
    ///
    /// Returns `None` when a required field is missing, which the validator
    /// never lets through for creates.
    pub fn from_changes(changes: MemberChanges) -> Option<Self> {
        Some(Self {
            first_name: changes.first_name?,
            last_name: changes.last_name?,
            email: changes.email?,
            phone_number: changes.phone_number?,
            role: changes.role.unwrap_or_default(),
        })
    }
}
