//! Class-level access policy.
//!
//! Every content type (materials, conferences, recordings, assignments,
//! quizzes) is tagged with a class level and an owner. The same rule decides
//! both detail access (`can_view`) and list filtering (`ListScope`):
//!
//! * admins see everything;
//! * teachers see what they own plus anything in their own class level;
//! * students see only their own class level, and nothing without one.

use crate::errors::AppError;
use crate::models::user::Role;

/// The requesting user, loaded fresh from the database per request.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub class_level: Option<String>,
}

impl Viewer {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn name(&self) -> &str {
        if self.display_name.is_empty() { &self.username } else { &self.display_name }
    }
}

/// A resource tagged with a class level and an owning user.
pub trait ClassScoped {
    fn class_level(&self) -> &str;
    fn owner_id(&self) -> i64;
}

pub fn can_view(viewer: &Viewer, item: &impl ClassScoped) -> bool {
    match viewer.role {
        Role::Admin => true,
        Role::Teacher => {
            item.owner_id() == viewer.user_id
                || viewer.class_level.as_deref() == Some(item.class_level())
        }
        Role::Student => viewer.class_level.as_deref() == Some(item.class_level()),
    }
}

/// Edit and delete rights: the owner or an admin.
pub fn can_manage(viewer: &Viewer, item: &impl ClassScoped) -> bool {
    viewer.is_admin() || (viewer.is_teacher() && item.owner_id() == viewer.user_id)
}

pub fn require_view(viewer: &Viewer, item: &impl ClassScoped) -> Result<(), AppError> {
    if can_view(viewer, item) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "user {} may not view class {} content",
            viewer.user_id,
            item.class_level()
        )))
    }
}

pub fn require_manage(viewer: &Viewer, item: &impl ClassScoped) -> Result<(), AppError> {
    if can_manage(viewer, item) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "user {} does not own this resource",
            viewer.user_id
        )))
    }
}

pub fn require_role(viewer: &Viewer, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&viewer.role) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "role '{}' may not perform this action",
            viewer.role.as_str()
        )))
    }
}

pub fn require_staff(viewer: &Viewer) -> Result<(), AppError> {
    require_role(viewer, &[Role::Teacher, Role::Admin])
}

pub fn require_admin(viewer: &Viewer) -> Result<(), AppError> {
    require_role(viewer, &[Role::Admin])
}

/// List-query form of `can_view`.
///
/// List queries take three leading parameters and embed
/// [`ListScope::predicate`]: `$1` the mode, `$2` the class level and `$3`
/// the viewer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    All,
    ClassLevel(Option<String>),
    OwnedOrClassLevel { user_id: i64, class_level: Option<String> },
}

impl ListScope {
    pub fn for_viewer(viewer: &Viewer) -> Self {
        match viewer.role {
            Role::Admin => ListScope::All,
            Role::Teacher => ListScope::OwnedOrClassLevel {
                user_id: viewer.user_id,
                class_level: viewer.class_level.clone(),
            },
            Role::Student => ListScope::ClassLevel(viewer.class_level.clone()),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            ListScope::All => "all",
            ListScope::ClassLevel(_) => "class",
            ListScope::OwnedOrClassLevel { .. } => "owned",
        }
    }

    pub fn class_level(&self) -> Option<String> {
        match self {
            ListScope::All => None,
            ListScope::ClassLevel(level) => level.clone(),
            ListScope::OwnedOrClassLevel { class_level, .. } => class_level.clone(),
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            ListScope::OwnedOrClassLevel { user_id, .. } => *user_id,
            _ => 0,
        }
    }

    /// SQL predicate over `alias` where `owner_col` holds the owning user.
    /// A NULL class level never matches, so a student without one sees nothing.
    pub fn predicate(alias: &str, owner_col: &str) -> String {
        format!(
            "($1 = 'all' OR {alias}.class_level = $2 OR ($1 = 'owned' AND {alias}.{owner_col} = $3))"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        class_level: &'static str,
        owner: i64,
    }

    impl ClassScoped for Item {
        fn class_level(&self) -> &str {
            self.class_level
        }
        fn owner_id(&self) -> i64 {
            self.owner
        }
    }

    fn viewer(id: i64, role: Role, class_level: Option<&str>) -> Viewer {
        Viewer {
            user_id: id,
            username: format!("u{id}"),
            display_name: String::new(),
            email: String::new(),
            role,
            class_level: class_level.map(String::from),
        }
    }

    #[test]
    fn student_sees_only_own_class() {
        let s = viewer(1, Role::Student, Some("7"));
        assert!(can_view(&s, &Item { class_level: "7", owner: 9 }));
        assert!(!can_view(&s, &Item { class_level: "8", owner: 9 }));
        assert!(!can_manage(&s, &Item { class_level: "7", owner: 1 }));
    }

    #[test]
    fn student_without_class_sees_nothing() {
        let s = viewer(1, Role::Student, None);
        assert!(!can_view(&s, &Item { class_level: "7", owner: 9 }));
        assert_eq!(ListScope::for_viewer(&s).class_level(), None);
    }

    #[test]
    fn teacher_sees_owned_or_class() {
        let t = viewer(2, Role::Teacher, Some("5"));
        assert!(can_view(&t, &Item { class_level: "5", owner: 9 }));
        assert!(can_view(&t, &Item { class_level: "10", owner: 2 }));
        assert!(!can_view(&t, &Item { class_level: "10", owner: 9 }));
        assert!(can_manage(&t, &Item { class_level: "10", owner: 2 }));
        assert!(!can_manage(&t, &Item { class_level: "5", owner: 9 }));
    }

    #[test]
    fn admin_sees_and_manages_all() {
        let a = viewer(3, Role::Admin, None);
        let item = Item { class_level: "12", owner: 9 };
        assert!(can_view(&a, &item));
        assert!(can_manage(&a, &item));
        assert_eq!(ListScope::for_viewer(&a), ListScope::All);
    }

    #[test]
    fn scope_parameters_follow_role() {
        let t = viewer(2, Role::Teacher, Some("5"));
        let scope = ListScope::for_viewer(&t);
        assert_eq!(scope.mode(), "owned");
        assert_eq!(scope.class_level().as_deref(), Some("5"));
        assert_eq!(scope.user_id(), 2);

        let s = viewer(1, Role::Student, Some("7"));
        let scope = ListScope::for_viewer(&s);
        assert_eq!(scope.mode(), "class");
        assert_eq!(scope.user_id(), 0);
    }

    #[test]
    fn role_gates() {
        let s = viewer(1, Role::Student, Some("7"));
        assert!(require_staff(&s).is_err());
        assert!(require_role(&s, &[Role::Student]).is_ok());
        assert!(require_admin(&viewer(2, Role::Teacher, None)).is_err());
    }

    #[test]
    fn predicate_mentions_owner_column() {
        let sql = ListScope::predicate("m", "uploaded_by");
        assert!(sql.contains("m.class_level = $2"));
        assert!(sql.contains("m.uploaded_by = $3"));
    }
}
