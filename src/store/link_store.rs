//! Transactional persistence for `aasId -> list<(name,value)>`.
//!
//! Each operation owns its transaction: on any error the transaction
//! drops without a commit and Postgres rolls it back. There is no
//! user-visible begin/commit.

use sqlx::PgPool;
use tracing::instrument;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LinkRow {
    name: String,
    value: String,
}

#[derive(Clone)]
pub struct LinkStore {
    pool: PgPool,
}

impl LinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the links attached to `aas_id`, in insertion order.
    /// `NOT_FOUND` if the identifier has never been created.
    #[instrument(skip(self))]
    pub async fn get_links(&self, aas_id: &str) -> Result<Vec<Link>, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::internal("store", "get_links", "DISC-TX-BEGIN", e))?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM aas_identifier WHERE aas_id = $1")
            .bind(aas_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::internal("store", "get_links", "DISC-GET-LOOKUP", e))?;

        let Some(identity_id) = exists else {
            return Err(AppError::not_found("store", "get_links", "aas identifier not found"));
        };

        let rows = sqlx::query_as::<_, LinkRow>(
            "SELECT name, value FROM asset_link WHERE aas_ref = $1 ORDER BY id ASC",
        )
        .bind(identity_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::internal("store", "get_links", "DISC-GET-LINKS", e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::internal("store", "get_links", "DISC-TX-COMMIT", e))?;

        Ok(rows.into_iter().map(|r| Link { name: r.name, value: r.value }).collect())
    }

    /// Deletes `aas_id` and, via cascade, its links. `NOT_FOUND` if
    /// nothing was removed.
    #[instrument(skip(self))]
    pub async fn delete_links(&self, aas_id: &str) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::internal("store", "delete_links", "DISC-TX-BEGIN", e))?;

        let deleted = sqlx::query_scalar::<_, i64>("DELETE FROM aas_identifier WHERE aas_id = $1 RETURNING id")
            .bind(aas_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::internal("store", "delete_links", "DISC-DELETE", e))?;

        if deleted.is_none() {
            return Err(AppError::not_found("store", "delete_links", "aas identifier not found"));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::internal("store", "delete_links", "DISC-TX-COMMIT", e))?;
        Ok(())
    }

    /// Upserts `aas_id`, replaces its entire link set with `links`
    /// (idempotent on resubmit), de-duplicating `(name,value)` pairs
    /// within the request.
    #[instrument(skip(self, links))]
    pub async fn create_links(&self, aas_id: &str, links: &[Link]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::internal("store", "create_links", "DISC-TX-BEGIN", e))?;

        let identity_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO aas_identifier (aas_id)
            VALUES ($1)
            ON CONFLICT (aas_id) DO UPDATE SET aas_id = EXCLUDED.aas_id
            RETURNING id
            "#,
        )
        .bind(aas_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::internal("store", "create_links", "DISC-CREATE-UPSERT", e))?;

        sqlx::query("DELETE FROM asset_link WHERE aas_ref = $1")
            .bind(identity_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::internal("store", "create_links", "DISC-CREATE-CLEAR", e))?;

        let mut deduped: Vec<&Link> = Vec::with_capacity(links.len());
        for link in links {
            if !deduped.iter().any(|l| l.name == link.name && l.value == link.value) {
                deduped.push(link);
            }
        }

        for link in deduped {
            sqlx::query("INSERT INTO asset_link (name, value, aas_ref) VALUES ($1, $2, $3)")
                .bind(&link.name)
                .bind(&link.value)
                .bind(identity_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::internal("store", "create_links", "DISC-CREATE-COPYIN", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::internal("store", "create_links", "DISC-TX-COMMIT", e))?;
        Ok(())
    }
}
