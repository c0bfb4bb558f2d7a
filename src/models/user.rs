use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Subject id issued by the identity provider.
    pub id: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub superadmin: bool,
    pub student_number: String,
    pub full_name: String,
    #[serde(default)]
    pub pfp_url: String,
}

/// A single permitted change to a user. The id has no variant.
#[derive(Debug, Clone, PartialEq)]
pub enum UserUpdate {
    Admin(bool),
    SuperAdmin(bool),
    StudentNumber(String),
    FullName(String),
    ProfilePicUrl(String),
}

impl UserUpdate {
    pub fn key(&self) -> &'static str {
        match self {
            UserUpdate::Admin(_) => "admin",
            UserUpdate::SuperAdmin(_) => "superadmin",
            UserUpdate::StudentNumber(_) => "student_number",
            UserUpdate::FullName(_) => "full_name",
            UserUpdate::ProfilePicUrl(_) => "pfp_url",
        }
    }

    pub fn apply(&self, user: &mut User) {
        match self {
            UserUpdate::Admin(v) => user.admin = *v,
            UserUpdate::SuperAdmin(v) => user.superadmin = *v,
            UserUpdate::StudentNumber(v) => user.student_number = v.clone(),
            UserUpdate::FullName(v) => user.full_name = v.clone(),
            UserUpdate::ProfilePicUrl(v) => user.pfp_url = v.clone(),
        }
    }
}
