//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use value_coach_core::domain::{
    Advance, AnswerCommit, HistoryEntry, Response, Session, SessionOverview, Stage, User,
};
use value_coach_core::ports::{DatabaseService, PortError, PortResult};

// Postgres SQLSTATE codes.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const SESSION_COLUMNS: &str =
    "id, user_id, stage, current_question_index, is_completed, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn find_active_session(&self, user_id: Uuid, stage: Stage) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 AND stage = $2 AND NOT is_completed"
        ))
        .bind(user_id)
        .bind(stage.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Active {} session for user {}", stage, user_id)))?;
        record.to_domain()
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what())),
        _ => unexpected(e),
    }
}

fn sqlstate(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c.into_owned())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    location: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            location: self.location,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    stage: String,
    current_question_index: i32,
    is_completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        Ok(Session {
            id: self.id,
            user_id: self.user_id,
            stage: parse_stage(&self.stage)?,
            current_question_index: self.current_question_index as u32,
            is_completed: self.is_completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ResponseRecord {
    id: Uuid,
    session_id: Uuid,
    question_number: i32,
    question_text: String,
    answer_text: String,
    generated_text: String,
    created_at: DateTime<Utc>,
}
impl ResponseRecord {
    fn to_domain(self) -> Response {
        Response {
            id: self.id,
            session_id: self.session_id,
            question_number: self.question_number as u32,
            question_text: self.question_text,
            answer_text: self.answer_text,
            generated_text: self.generated_text,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct HistoryRecord {
    stage: String,
    #[sqlx(flatten)]
    response: ResponseRecord,
}
impl HistoryRecord {
    fn to_domain(self) -> PortResult<HistoryEntry> {
        Ok(HistoryEntry {
            stage: parse_stage(&self.stage)?,
            response: self.response.to_domain(),
        })
    }
}

#[derive(FromRow)]
struct OverviewRecord {
    #[sqlx(flatten)]
    session: SessionRecord,
    response_count: i64,
    last_response_at: Option<DateTime<Utc>>,
}
impl OverviewRecord {
    fn to_domain(self) -> PortResult<SessionOverview> {
        Ok(SessionOverview {
            session: self.session.to_domain()?,
            response_count: self.response_count as u32,
            last_response_at: self.last_response_at,
        })
    }
}

fn parse_stage(value: &str) -> PortResult<Stage> {
    value
        .parse()
        .map_err(|e| PortError::Unexpected(format!("Corrupt session row: {}", e)))
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, name: &str, location: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, name, location) VALUES ($1, $2, $3) RETURNING id, name, location, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(location)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, location, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("User {}", user_id)))?;
        Ok(record.to_domain())
    }

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Session {}", session_id)))?;
        record.to_domain()
    }

    async fn find_latest_session(
        &self,
        user_id: Uuid,
        stage: Stage,
    ) -> PortResult<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 AND stage = $2 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(stage.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(SessionRecord::to_domain).transpose()
    }

    async fn create_session(&self, user_id: Uuid, stage: Stage) -> PortResult<Session> {
        let now = Utc::now();
        let inserted = sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO sessions (id, user_id, stage, current_question_index, is_completed, created_at, updated_at) \
             VALUES ($1, $2, $3, 1, FALSE, $4, $4) \
             ON CONFLICT (user_id, stage) WHERE NOT is_completed DO NOTHING \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(stage.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match sqlstate(&e).as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;

        match inserted {
            Some(record) => record.to_domain(),
            // Lost the race against a concurrent start of the same stage.
            None => self.find_active_session(user_id, stage).await,
        }
    }

    async fn get_sessions_by_user(&self, user_id: Uuid) -> PortResult<Vec<SessionOverview>> {
        let records = sqlx::query_as::<_, OverviewRecord>(
            "SELECT s.id, s.user_id, s.stage, s.current_question_index, s.is_completed, \
                    s.created_at, s.updated_at, \
                    COUNT(ur.id) AS response_count, \
                    MAX(ur.created_at) AS last_response_at \
             FROM sessions s \
             LEFT JOIN user_responses ur ON ur.session_id = s.id \
             WHERE s.user_id = $1 \
             GROUP BY s.id \
             ORDER BY s.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(OverviewRecord::to_domain).collect()
    }

    async fn record_answer(&self, commit: AnswerCommit) -> PortResult<Session> {
        let (next_index, completed) = match commit.advance {
            Advance::NextQuestion(next) => (next, false),
            Advance::Complete => (commit.expected_index, true),
        };
        let response = commit.response;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Compare-and-set on the stored index: only one writer per question wins.
        let updated = sqlx::query_as::<_, SessionRecord>(&format!(
            "UPDATE sessions \
             SET current_question_index = $1, is_completed = $2, updated_at = $3 \
             WHERE id = $4 AND current_question_index = $5 AND NOT is_completed \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(next_index as i32)
        .bind(completed)
        .bind(Utc::now())
        .bind(commit.session_id)
        .bind(commit.expected_index as i32)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some(updated) = updated else {
            tx.rollback().await.map_err(unexpected)?;
            // Distinguish a missing session from one that moved on.
            self.get_session_by_id(commit.session_id).await?;
            return Err(PortError::Conflict(format!(
                "Session {} is no longer at question {}",
                commit.session_id, commit.expected_index
            )));
        };

        sqlx::query(
            "INSERT INTO user_responses \
             (id, session_id, question_number, question_text, answer_text, generated_text, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(response.id)
        .bind(response.session_id)
        .bind(response.question_number as i32)
        .bind(&response.question_text)
        .bind(&response.answer_text)
        .bind(&response.generated_text)
        .bind(response.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match sqlstate(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => PortError::Conflict(format!(
                "Question {} of session {} is already answered",
                response.question_number, response.session_id
            )),
            _ => unexpected(e),
        })?;

        tx.commit().await.map_err(unexpected)?;
        updated.to_domain()
    }

    async fn get_responses_for_session(&self, session_id: Uuid) -> PortResult<Vec<Response>> {
        let records = sqlx::query_as::<_, ResponseRecord>(
            "SELECT id, session_id, question_number, question_text, answer_text, generated_text, created_at \
             FROM user_responses WHERE session_id = $1 ORDER BY question_number ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_responses_for_user(&self, user_id: Uuid) -> PortResult<Vec<HistoryEntry>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            "SELECT s.stage, ur.id, ur.session_id, ur.question_number, ur.question_text, \
                    ur.answer_text, ur.generated_text, ur.created_at \
             FROM user_responses ur \
             JOIN sessions s ON ur.session_id = s.id \
             WHERE s.user_id = $1 \
             ORDER BY s.created_at ASC, ur.question_number ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(HistoryRecord::to_domain).collect()
    }
}

// These run against a throwaway database created by `sqlx::test` from
// `DATABASE_URL`. Run with: cargo test -p api -- --ignored
#[cfg(test)]
mod tests {
    use super::*;

    fn commit(session_id: Uuid, question_number: u32, advance: Advance) -> AnswerCommit {
        AnswerCommit {
            session_id,
            expected_index: question_number,
            response: Response {
                id: Uuid::new_v4(),
                session_id,
                question_number,
                question_text: format!("Question {}", question_number),
                answer_text: "An answer".to_string(),
                generated_text: "Some commentary".to_string(),
                created_at: Utc::now(),
            },
            advance,
        }
    }

    async fn vision_session(db: &DbAdapter) -> Session {
        let user = db.create_user("Ada", "Lagos").await.unwrap();
        db.create_session(user.id, Stage::Vision).await.unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires a Postgres DATABASE_URL"]
    async fn an_answer_advances_the_session_once(pool: PgPool) {
        let db = DbAdapter::new(pool);
        let session = vision_session(&db).await;
        assert_eq!(session.current_question_index, 1);

        let updated = db
            .record_answer(commit(session.id, 1, Advance::NextQuestion(2)))
            .await
            .unwrap();
        assert_eq!(updated.current_question_index, 2);
        assert!(!updated.is_completed);

        let again = db
            .record_answer(commit(session.id, 1, Advance::NextQuestion(2)))
            .await;
        assert!(matches!(again, Err(PortError::Conflict(_))));

        let responses = db.get_responses_for_session(session.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].question_number, 1);
        assert_eq!(db.get_session_by_id(session.id).await.unwrap().current_question_index, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires a Postgres DATABASE_URL"]
    async fn concurrent_answers_to_one_question_record_once(pool: PgPool) {
        let db = DbAdapter::new(pool);
        let session = vision_session(&db).await;

        let (first, second) = tokio::join!(
            db.record_answer(commit(session.id, 1, Advance::NextQuestion(2))),
            db.record_answer(commit(session.id, 1, Advance::NextQuestion(2))),
        );
        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(db.get_responses_for_session(session.id).await.unwrap().len(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires a Postgres DATABASE_URL"]
    async fn completing_a_session_rejects_further_answers(pool: PgPool) {
        let db = DbAdapter::new(pool);
        let user = db.create_user("Ada", "Lagos").await.unwrap();
        let session = db.create_session(user.id, Stage::Leverage).await.unwrap();

        let done = db
            .record_answer(commit(session.id, 1, Advance::Complete))
            .await
            .unwrap();
        assert!(done.is_completed);
        assert_eq!(done.current_question_index, 1);

        let late = db.record_answer(commit(session.id, 1, Advance::Complete)).await;
        assert!(matches!(late, Err(PortError::Conflict(_))));

        // A completed session no longer holds the stage's active slot.
        let next = db.create_session(user.id, Stage::Leverage).await.unwrap();
        assert_ne!(next.id, session.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires a Postgres DATABASE_URL"]
    async fn answering_an_unknown_session_is_not_found(pool: PgPool) {
        let db = DbAdapter::new(pool);
        let result = db
            .record_answer(commit(Uuid::new_v4(), 1, Advance::NextQuestion(2)))
            .await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires a Postgres DATABASE_URL"]
    async fn one_active_session_per_user_and_stage(pool: PgPool) {
        let db = DbAdapter::new(pool);
        let user = db.create_user("Ada", "Lagos").await.unwrap();

        let (a, b) = tokio::join!(
            db.create_session(user.id, Stage::Vision),
            db.create_session(user.id, Stage::Vision),
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
    }
}
