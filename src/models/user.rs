use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const BADGE_STEP: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub branch: Option<String>,
    pub points: i64,
    pub total_points_earned: i64,
    pub total_points_spent: i64,
    pub created_at: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn profile(&self) -> SessionProfile {
        SessionProfile {
            uid: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
            username: self.username.clone(),
            branch: self.branch.clone(),
        }
    }
}

/// What a client caches after login. Points are deliberately absent, they are
/// read live from `/auth/me` or the event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionProfile {
    pub uid: String,
    pub email: String,
    pub role: Role,
    pub username: String,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupReq {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: SessionProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PointsKind {
    SignupBonus,
    Upload,
    AdminVerified,
    AdminGrant,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PointsEntry {
    pub amount: i64,
    pub kind: PointsKind,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct BadgeProgress {
    pub progress_percent: f64,
    pub points_to_next: i64,
}

impl BadgeProgress {
    pub fn for_points(points: i64) -> Self {
        let into_step = points.rem_euclid(BADGE_STEP);
        let progress = (into_step as f64 / BADGE_STEP as f64 * 100.0).min(100.0);
        Self {
            progress_percent: progress,
            points_to_next: BADGE_STEP - into_step,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: SessionProfile,
    pub points: i64,
    pub total_points_earned: i64,
    pub total_points_spent: i64,
    pub badge: BadgeProgress,
}

impl From<&User> for MeResponse {
    fn from(user: &User) -> Self {
        Self {
            profile: user.profile(),
            points: user.points,
            total_points_earned: user.total_points_earned,
            total_points_spent: user.total_points_spent,
            badge: BadgeProgress::for_points(user.points),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeaderboardEntry {
    #[sqlx(default)]
    pub rank: i64,
    pub user_id: String,
    pub username: String,
    pub branch: Option<String>,
    pub points: i64,
    pub uploads: i64,
}
