use actix_session::Session;
use sqlx::PgPool;

use crate::auth::policy::Viewer;
use crate::errors::AppError;
use crate::models::user::{self, User};

pub fn get_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>("user_id").unwrap_or(None)
}

pub fn get_username(session: &Session) -> Result<String, String> {
    match session.get::<String>("username") {
        Ok(Some(username)) => Ok(username),
        Ok(None) => Err("No username in session".to_string()),
        Err(e) => Err(format!("Session error: {}", e)),
    }
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}

/// Store identity after a successful login. The session id is renewed to
/// prevent fixation.
pub fn start(session: &Session, user: &User) -> Result<(), AppError> {
    session.renew();
    session
        .insert("user_id", user.id)
        .map_err(|e| AppError::Session(e.to_string()))?;
    session
        .insert("username", &user.username)
        .map_err(|e| AppError::Session(e.to_string()))?;
    Ok(())
}

/// Load the requesting user. Role and class level come from the database,
/// not the cookie, so admin changes take effect on the next request.
pub async fn current_viewer(session: &Session, pool: &PgPool) -> Result<Viewer, AppError> {
    let user_id = get_user_id(session)
        .ok_or_else(|| AppError::Session("No user in session".to_string()))?;

    let Some(user) = user::find_by_id(pool, user_id).await? else {
        session.purge();
        return Err(AppError::Session(format!("User {user_id} no longer exists")));
    };

    if !user.is_active {
        session.purge();
        return Err(AppError::Session(format!("User {user_id} is deactivated")));
    }

    Ok(viewer_from_user(&user))
}

pub fn viewer_from_user(user: &User) -> Viewer {
    Viewer {
        user_id: user.id,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        email: user.email.clone(),
        role: user.role(),
        class_level: user.class_level.clone(),
    }
}
