use rusqlite::{params, Connection, OptionalExtension, Row};

use super::Db;
use crate::error::AppResult;
use crate::tutoring::{RequestStatus, TutorRequest};

const REQUEST_COLUMNS: &str = "r.id, r.student_id, r.tutor_id, r.module_id, r.conversation_id, \
     r.subject, r.details, r.status, r.created_at, r.updated_at";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<TutorRequest> {
    Ok(TutorRequest {
        id: row.get(0)?,
        student_id: row.get(1)?,
        tutor_id: row.get(2)?,
        module_id: row.get(3)?,
        conversation_id: row.get(4)?,
        subject: row.get(5)?,
        details: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn insert_request(conn: &Connection, request: &TutorRequest) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO tutor_requests (id, student_id, tutor_id, module_id, conversation_id,
                                     subject, details, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            request.id,
            request.student_id,
            request.tutor_id,
            request.module_id,
            request.conversation_id,
            request.subject,
            request.details,
            request.status,
            request.created_at,
            request.updated_at
        ],
    )
}

impl Db {
    pub fn insert_tutor_request(&self, request: &TutorRequest) -> AppResult<()> {
        self.with_conn(|conn| insert_request(conn, request))?;
        Ok(())
    }

    /// Link `conversation_id` to a new request and store the request in one
    /// transaction. Returns `false` if the conversation was already
    /// escalated, in which case nothing is written.
    pub fn insert_escalated_request(&self, conversation_id: &str, request: &TutorRequest) -> AppResult<bool> {
        self.with_tx(|tx| {
            let linked = tx.execute(
                "UPDATE chatbot_conversations SET escalated_request_id = ?2, updated_at = ?3
                 WHERE id = ?1 AND escalated_request_id IS NULL",
                params![conversation_id, request.id, request.created_at],
            )?;
            if linked == 0 {
                return Ok(false);
            }
            insert_request(tx, request)?;
            Ok(true)
        })
    }

    pub fn find_tutor_request(&self, id: &str) -> AppResult<Option<TutorRequest>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM tutor_requests r WHERE r.id = ?1", REQUEST_COLUMNS),
                [id],
                request_from_row,
            )
            .optional()
        })
    }

    pub fn update_tutor_request(&self, request: &TutorRequest) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tutor_requests SET tutor_id = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
                params![request.id, request.tutor_id, request.status, request.updated_at],
            )
        })?;
        Ok(())
    }

    pub fn requests_for_student(&self, student_id: &str) -> AppResult<Vec<TutorRequest>> {
        self.query_requests("WHERE r.student_id = ?1", params![student_id])
    }

    /// Requests a tutor can act on: open ones in modules they teach (or with
    /// no module at all) plus everything already assigned to them.
    pub fn requests_for_tutor(&self, tutor_id: &str) -> AppResult<Vec<TutorRequest>> {
        self.query_requests(
            "WHERE r.tutor_id = ?1
                OR (r.status = ?2 AND (r.module_id IS NULL OR r.module_id IN
                    (SELECT module_id FROM tutor_modules WHERE tutor_id = ?1)))",
            params![tutor_id, RequestStatus::Pending],
        )
    }

    pub fn all_tutor_requests(&self) -> AppResult<Vec<TutorRequest>> {
        self.query_requests("", params![])
    }

    fn query_requests(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> AppResult<Vec<TutorRequest>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tutor_requests r {} ORDER BY r.created_at DESC, r.rowid DESC",
                REQUEST_COLUMNS, filter
            ))?;
            let rows = stmt.query_map(args, request_from_row)?;
            let requests = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(requests)
        })
    }
}
