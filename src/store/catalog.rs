use rusqlite::{params, OptionalExtension, Row};

use super::{conflict_on_duplicate, Db};
use crate::catalog::Module;
use crate::error::AppResult;

fn module_from_row(row: &Row<'_>) -> rusqlite::Result<Module> {
    Ok(Module {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl Db {
    pub fn insert_module(&self, module: &Module) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO modules (id, code, title, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![module.id, module.code, module.title, module.description, module.created_at],
            )
        })
        .map_err(|e| conflict_on_duplicate(e, "module code already exists"))?;
        Ok(())
    }

    pub fn find_module(&self, id: &str) -> AppResult<Option<Module>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, code, title, description, created_at FROM modules WHERE id = ?1",
                [id],
                module_from_row,
            )
            .optional()
        })
    }

    pub fn list_modules(&self) -> AppResult<Vec<Module>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, code, title, description, created_at FROM modules ORDER BY code",
            )?;
            let rows = stmt.query_map([], module_from_row)?;
            let modules = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(modules)
        })
    }
}
