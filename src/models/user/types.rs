use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
            Role::Admin => "Administrator",
        }
    }

    /// Teachers and admins author content.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Exempt,
    Failed,
}

impl PaymentStatus {
    pub fn parse(s: &str) -> PaymentStatus {
        match s {
            "paid" => PaymentStatus::Paid,
            "exempt" => PaymentStatus::Exempt,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Exempt => "exempt",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Registration is settled when paid or exempt.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Exempt)
    }
}

/// Full user row including the password hash. Never hand to templates.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub class_level: Option<String>,
    pub bio: String,
    pub phone_number: String,
    pub is_active: bool,
    pub payment_status: String,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_amount: Option<i64>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Student)
    }

    pub fn payment(&self) -> PaymentStatus {
        PaymentStatus::parse(&self.payment_status)
    }

    pub fn name(&self) -> &str {
        if self.display_name.is_empty() { &self.username } else { &self.display_name }
    }
}

/// Row for lists and pickers.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: String,
    pub class_level: Option<String>,
    pub is_active: bool,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
}

impl UserSummary {
    pub fn class_label(&self) -> String {
        self.class_level
            .as_deref()
            .map(crate::models::class_level::label)
            .unwrap_or_else(|| "-".to_string())
    }
}

pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub class_level: Option<String>,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub password_confirm: String,
    pub role: String,
    #[serde(default)]
    pub class_level: String,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub class_level: String,
    pub csrf_token: String,
}

/// Admin edit of another account.
#[derive(Debug, Deserialize)]
pub struct ManageUserForm {
    pub role: String,
    #[serde(default)]
    pub class_level: String,
    pub csrf_token: String,
}
