//! How an author is shown next to a post, topic, reply or comment.
//!
//! Anonymous content is labelled with the author's codename. The real id and
//! role stay visible only to the author themself and to admins.

use serde::Serialize;

use crate::auth::{Role, User};
use crate::codename::codename;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorView {
    pub id: Option<String>,
    pub display_name: String,
    pub role: Option<Role>,
    pub anonymous: bool,
}

impl AuthorView {
    /// Present `author` (who may have been deleted) to `viewer`.
    pub fn present(
        author_id: &str,
        author: Option<&User>,
        anonymous: bool,
        viewer: Option<&User>,
    ) -> Self {
        if anonymous {
            let privileged =
                viewer.map_or(false, |v| v.id == author_id || v.is_admin());
            return AuthorView {
                id: privileged.then(|| author_id.to_string()),
                display_name: codename(author_id),
                role: if privileged { author.map(|a| a.role) } else { None },
                anonymous: true,
            };
        }

        match author {
            Some(user) => AuthorView {
                id: Some(user.id.clone()),
                display_name: user.display_name.clone(),
                role: Some(user.role),
                anonymous: false,
            },
            None => AuthorView {
                id: None,
                display_name: "Deleted user".to_string(),
                role: None,
                anonymous: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.edu", id),
            display_name: format!("User {}", id),
            role,
            bio: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_named_author() {
        let author = user("a", Role::Tutor);
        let view = AuthorView::present("a", Some(&author), false, None);
        assert_eq!(view.id.as_deref(), Some("a"));
        assert_eq!(view.display_name, "User a");
        assert_eq!(view.role, Some(Role::Tutor));
    }

    #[test]
    fn test_anonymous_author_hidden_from_others() {
        let author = user("a", Role::Student);
        let other = user("b", Role::Student);
        let view = AuthorView::present("a", Some(&author), true, Some(&other));
        assert!(view.anonymous);
        assert_eq!(view.id, None);
        assert_eq!(view.role, None);
        assert_eq!(view.display_name, codename("a"));
    }

    #[test]
    fn test_anonymous_author_visible_to_self_and_admin() {
        let author = user("a", Role::Student);
        let admin = user("root", Role::Admin);
        for viewer in [&author, &admin] {
            let view = AuthorView::present("a", Some(&author), true, Some(viewer));
            assert_eq!(view.id.as_deref(), Some("a"));
            assert_eq!(view.display_name, codename("a"));
        }
    }

    #[test]
    fn test_deleted_author() {
        let view = AuthorView::present("gone", None, false, None);
        assert_eq!(view.display_name, "Deleted user");
        assert_eq!(view.id, None);
    }
}
