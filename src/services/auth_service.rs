use bcrypt::{hash, verify};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::now_epoch;
use crate::error::{AppError, AppResult};
use crate::models::user::{AuthResponse, PointsKind, Role, SignupReq, User};
use crate::services::points_service;

pub const MIN_PASSWORD_LEN: usize = 6;

const USER_COLUMNS: &str = "id, email, username, password_hash, role, branch, points, \
     total_points_earned, total_points_spent, created_at";

/// Validates a signup form in the order the client reports problems, one
/// field at a time.
pub fn validate_signup(req: &SignupReq, allowed_domain: &str) -> AppResult<Role> {
    let email = req.email.trim();
    if !allowed_domain.is_empty() && !email.ends_with(&format!("@{allowed_domain}")) {
        return Err(AppError::field(
            "email",
            format!("Email must be from @{allowed_domain} domain"),
        ));
    }
    if req.password != req.confirm_password {
        return Err(AppError::field("confirm_password", "Passwords do not match"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::field(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    let role = match req.role.as_deref().map(str::trim) {
        Some("student") => Role::Student,
        Some("faculty") => Role::Faculty,
        _ => return Err(AppError::field("role", "Please select a role")),
    };
    if req.username.trim().is_empty() {
        return Err(AppError::field("username", "Username is required"));
    }
    let has_branch = req.branch.as_deref().is_some_and(|b| !b.trim().is_empty());
    if role == Role::Student && !has_branch {
        return Err(AppError::field("branch", "Please select your branch"));
    }
    if !is_valid_email(email) {
        return Err(AppError::field("email", "Invalid email format"));
    }
    Ok(role)
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub async fn signup(pool: &SqlitePool, config: &Config, req: SignupReq) -> AppResult<User> {
    let role = validate_signup(&req, &config.allowed_email_domain)?;
    let email = req.email.trim().to_lowercase();
    // Branch is only kept for students.
    let branch = match role {
        Role::Student => req.branch.as_deref().map(|b| b.trim().to_string()),
        _ => None,
    };
    create_user(
        pool,
        &email,
        req.username.trim(),
        &req.password,
        role,
        branch.as_deref(),
        config.welcome_bonus,
        config.bcrypt_cost,
    )
    .await
}

/// The UNIQUE index on `users.email` is the only duplicate check, so two
/// racing signups still end in a clean conflict for the loser.
fn duplicate_email(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Email already in use".into())
        }
        _ => AppError::Database(e),
    }
}

#[allow(clippy::too_many_arguments)]
async fn create_user(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    password: &str,
    role: Role,
    branch: Option<&str>,
    welcome_bonus: i64,
    cost: u32,
) -> AppResult<User> {
    let password = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(anyhow::Error::from)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_epoch();

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO users (
            id, email, username, password_hash, role, branch,
            points, total_points_earned, total_points_spent, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&id)
    .bind(email)
    .bind(username)
    .bind(&password_hash)
    .bind(role)
    .bind(branch)
    .bind(welcome_bonus)
    .bind(welcome_bonus)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(duplicate_email)?;

    if welcome_bonus > 0 {
        points_service::insert_history(
            &mut tx,
            &id,
            welcome_bonus,
            PointsKind::SignupBonus,
            "Welcome bonus for joining",
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(user_id = %id, role = role.as_str(), "user registered");
    get_user(pool, &id).await?.ok_or(AppError::NotFound("User"))
}

pub async fn login(pool: &SqlitePool, email: &str, password: &str) -> AppResult<AuthResponse> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::field("email", "Invalid email format"));
    }

    let user = find_by_email(pool, &email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("No account found with this email".into()))?;

    let candidate = password.to_string();
    let stored = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || verify(candidate, &stored))
        .await
        .map_err(anyhow::Error::from)?
        .map_err(anyhow::Error::from)?;
    if !ok {
        return Err(AppError::Unauthorized("Incorrect password".into()));
    }

    tracing::info!(user_id = %user.id, "login");
    create_session(pool, &user).await
}

/// Issues an opaque session token for an already authenticated user.
pub async fn create_session(pool: &SqlitePool, user: &User) -> AppResult<AuthResponse> {
    let token = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(&user.id)
        .bind(now_epoch())
        .execute(pool)
        .await?;
    Ok(AuthResponse {
        token,
        user: user.profile(),
    })
}

pub async fn logout(pool: &SqlitePool, token: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn resolve_session(pool: &SqlitePool, token: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.id, u.email, u.username, u.password_hash, u.role, u.branch, u.points, \
         u.total_points_earned, u.total_points_spent, u.created_at \
         FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn list_users(pool: &SqlitePool) -> AppResult<Vec<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC");
    Ok(sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?)
}

pub async fn set_role(pool: &SqlitePool, user_id: &str, role: Role) -> AppResult<User> {
    let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User"));
    }
    get_user(pool, user_id).await?.ok_or(AppError::NotFound("User"))
}

/// Creates the configured admin account if it does not exist yet.
pub async fn seed_admin(pool: &SqlitePool, email: &str, password: &str, cost: u32) -> AppResult<()> {
    let email = email.trim().to_lowercase();
    if let Some(existing) = find_by_email(pool, &email).await? {
        if existing.role != Role::Admin {
            set_role(pool, &existing.id, Role::Admin).await?;
            tracing::info!(user_id = %existing.id, "existing account promoted to admin");
        }
        return Ok(());
    }
    create_user(pool, &email, "admin", password, Role::Admin, None, 0, cost).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SignupReq {
        SignupReq {
            role: Some("student".into()),
            username: "rohan".into(),
            email: "rohan@slrtce.in".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            branch: Some("Computer Science".into()),
        }
    }

    fn message(req: &SignupReq) -> String {
        validate_signup(req, "slrtce.in").unwrap_err().to_string()
    }

    #[test]
    fn accepts_a_complete_student_form() {
        assert_eq!(validate_signup(&form(), "slrtce.in").unwrap(), Role::Student);
    }

    #[test]
    fn reports_problems_in_form_order() {
        let mut req = form();
        req.email = "rohan@gmail.com".into();
        req.password = "x".into();
        assert_eq!(message(&req), "Email must be from @slrtce.in domain");

        let mut req = form();
        req.confirm_password = "other".into();
        assert_eq!(message(&req), "Passwords do not match");

        let mut req = form();
        req.password = "abc".into();
        req.confirm_password = "abc".into();
        assert_eq!(message(&req), "Password must be at least 6 characters");

        let mut req = form();
        req.role = Some("admin".into());
        assert_eq!(message(&req), "Please select a role");

        let mut req = form();
        req.username = "  ".into();
        assert_eq!(message(&req), "Username is required");

        let mut req = form();
        req.branch = None;
        assert_eq!(message(&req), "Please select your branch");
    }

    #[test]
    fn faculty_needs_no_branch_and_domain_check_can_be_disabled() {
        let mut req = form();
        req.role = Some("faculty".into());
        req.branch = None;
        req.email = "prof@example.org".into();
        assert_eq!(validate_signup(&req, "").unwrap(), Role::Faculty);
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("a@b.in"));
        assert!(!is_valid_email("@b.in"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a b@c.in"));
        assert!(!is_valid_email("plain"));
    }
}
