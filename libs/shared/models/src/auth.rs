use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: usize,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<i64>,
}

/// Identity handed over by the identity provider after token validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerRole::Patient => write!(f, "patient"),
            CallerRole::Doctor => write!(f, "doctor"),
            CallerRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for CallerRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(CallerRole::Patient),
            "doctor" => Ok(CallerRole::Doctor),
            "admin" => Ok(CallerRole::Admin),
            other => Err(AppError::Forbidden(format!("Unsupported role: {}", other))),
        }
    }
}

/// The engine's view of whoever is calling: an id and a role, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: CallerRole,
}

impl Caller {
    pub fn new(id: Uuid, role: CallerRole) -> Self {
        Self { id, role }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, CallerRole::Patient)
    }

    pub fn doctor(id: Uuid) -> Self {
        Self::new(id, CallerRole::Doctor)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, CallerRole::Admin)
    }

    pub fn is_doctor(&self, doctor_id: Uuid) -> bool {
        self.role == CallerRole::Doctor && self.id == doctor_id
    }
}

impl TryFrom<&User> for Caller {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;
        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("Token carries no role".to_string()))?
            .parse()?;

        Ok(Caller { id, role })
    }
}
