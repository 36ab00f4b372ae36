//! Academic modules (courses) and the tutors who teach them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::error::{AppError, AppResult};
use crate::store::Db;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub id: String,
    /// Unique course code, stored uppercase (e.g. `COMP1002`).
    pub code: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewModule {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Admin-only module creation.
pub fn create_module(db: &Db, actor: &User, input: NewModule) -> AppResult<Module> {
    if !actor.is_admin() {
        return Err(AppError::forbidden("only admins can create modules"));
    }
    let code = input.code.trim().to_uppercase();
    if code.is_empty() || code.len() > 20 || code.chars().any(char::is_whitespace) {
        return Err(AppError::validation("module code must be 1 to 20 characters without spaces"));
    }
    let title = input.title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(AppError::validation("module title must be 1 to 200 characters"));
    }

    let module = Module {
        id: Uuid::new_v4().to_string(),
        code,
        title: title.to_string(),
        description: input.description.trim().to_string(),
        created_at: Utc::now(),
    };
    db.insert_module(&module)?;
    Ok(module)
}

/// Replace the set of modules a tutor teaches.
pub fn set_teaching(db: &Db, tutor: &User, module_ids: &[String]) -> AppResult<Vec<Module>> {
    if !tutor.is_tutor() {
        return Err(AppError::forbidden("only tutors can choose teaching modules"));
    }
    let mut modules = Vec::with_capacity(module_ids.len());
    for id in module_ids {
        let module = db
            .find_module(id)?
            .ok_or_else(|| AppError::not_found(format!("module {}", id)))?;
        if !modules.iter().any(|m: &Module| m.id == module.id) {
            modules.push(module);
        }
    }
    let ids: Vec<String> = modules.iter().map(|m| m.id.clone()).collect();
    db.set_tutor_modules(&tutor.id, &ids)?;
    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_user, TestWorld};
    use crate::auth::Role;

    fn input(code: &str) -> NewModule {
        NewModule {
            code: code.to_string(),
            title: "Algorithms".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_admin_creates_module() {
        let db = Db::open_in_memory().unwrap();
        let admin = seed_user(&db, "root", Role::Admin);
        let module = create_module(&db, &admin, input(" comp2001 ")).unwrap();
        assert_eq!(module.code, "COMP2001");
        assert_eq!(db.list_modules().unwrap().len(), 1);
    }

    #[test]
    fn test_student_cannot_create_module() {
        let db = Db::open_in_memory().unwrap();
        let student = seed_user(&db, "sam", Role::Student);
        let err = create_module(&db, &student, input("COMP2001")).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_duplicate_code_conflicts() {
        let db = Db::open_in_memory().unwrap();
        let admin = seed_user(&db, "root", Role::Admin);
        create_module(&db, &admin, input("COMP2001")).unwrap();
        let err = create_module(&db, &admin, input("comp2001")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_set_teaching_replaces_and_dedupes() {
        let world = TestWorld::new();
        let tutor = seed_user(&world.db, "tia", Role::Tutor);
        let ids = vec![world.module.id.clone(), world.module.id.clone()];
        let modules = set_teaching(&world.db, &tutor, &ids).unwrap();
        assert_eq!(modules.len(), 1);

        let tutors = world.db.list_tutors(Some(&world.module.id)).unwrap();
        assert_eq!(tutors.len(), 1);
        assert_eq!(tutors[0].id, tutor.id);

        set_teaching(&world.db, &tutor, &[]).unwrap();
        assert!(world.db.list_tutors(Some(&world.module.id)).unwrap().is_empty());
    }

    #[test]
    fn test_set_teaching_unknown_module() {
        let db = Db::open_in_memory().unwrap();
        let tutor = seed_user(&db, "tia", Role::Tutor);
        let err = set_teaching(&db, &tutor, &["missing".to_string()]).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
