use super::feed::ChangeFeed;
use super::{
    Change, ChangeEvent, ChangeStream, CollectionPath, DocPath, Document, DocumentStore, KeyRange,
    Precondition, StoreError, apply_merge,
};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use sqlx::types::Json;

/// All collections share one table keyed by `(collection, doc_id)`.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection VARCHAR(255) NOT NULL,
    doc_id VARCHAR(255) NOT NULL,
    data JSON NOT NULL,
    version BIGINT UNSIGNED NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
    PRIMARY KEY (collection, doc_id)
)
"#;

/// Open range bounds bind as NULL, so one statement serves every `KeyRange`.
const LIST_SQL: &str = r#"
SELECT doc_id, data, version
FROM documents
WHERE collection = ?
AND (? IS NULL OR doc_id >= ?)
AND (? IS NULL OR doc_id <= ?)
ORDER BY doc_id ASC
"#;

pub struct MySqlStore {
    pool: MySqlPool,
    feed: ChangeFeed,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
        }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn upserted(&self, path: &DocPath, data: Value) {
        self.feed.publish(
            path.collection(),
            ChangeEvent {
                id: path.id().to_string(),
                change: Change::Upserted { data },
            },
        );
    }
}

fn is_duplicate_key(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

#[async_trait]
impl DocumentStore for MySqlStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, (Json<Value>, u64)>(
            r#"
            SELECT data, version
            FROM documents
            WHERE collection = ? AND doc_id = ?
            "#,
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(data), version)| Document { data, version }))
    }

    async fn put(
        &self,
        path: &DocPath,
        data: Value,
        precondition: Precondition,
    ) -> Result<u64, StoreError> {
        if !data.is_object() {
            return Err(StoreError::NotAnObject(path.to_string()));
        }

        let version = match precondition {
            Precondition::Absent => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO documents (collection, doc_id, data, version)
                    VALUES (?, ?, ?, 1)
                    "#,
                )
                .bind(path.collection().as_str())
                .bind(path.id())
                .bind(Json(&data))
                .execute(&self.pool)
                .await;

                match result {
                    Ok(_) => 1,
                    Err(e) if is_duplicate_key(&e) => {
                        return Err(StoreError::PreconditionFailed(path.to_string()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Precondition::Version(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE documents
                    SET data = ?, version = version + 1
                    WHERE collection = ? AND doc_id = ? AND version = ?
                    "#,
                )
                .bind(Json(&data))
                .bind(path.collection().as_str())
                .bind(path.id())
                .bind(expected)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::PreconditionFailed(path.to_string()));
                }
                expected + 1
            }
            Precondition::Any => {
                let mut tx = self.pool.begin().await?;
                let current = sqlx::query_scalar::<_, u64>(
                    r#"
                    SELECT version FROM documents
                    WHERE collection = ? AND doc_id = ?
                    FOR UPDATE
                    "#,
                )
                .bind(path.collection().as_str())
                .bind(path.id())
                .fetch_optional(&mut *tx)
                .await?;

                let version = current.unwrap_or(0) + 1;
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, doc_id, data, version)
                    VALUES (?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE data = VALUES(data), version = VALUES(version)
                    "#,
                )
                .bind(path.collection().as_str())
                .bind(path.id())
                .bind(Json(&data))
                .bind(version)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                version
            }
        };

        self.upserted(path, data);
        Ok(version)
    }

    async fn merge(&self, path: &DocPath, patch: Map<String, Value>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, (Json<Value>, u64)>(
            r#"
            SELECT data, version FROM documents
            WHERE collection = ? AND doc_id = ?
            FOR UPDATE
            "#,
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .fetch_optional(&mut *tx)
        .await?;

        let (mut target, version) = match current {
            Some((Json(Value::Object(map)), v)) => (map, v + 1),
            Some(_) => return Err(StoreError::NotAnObject(path.to_string())),
            None => (Map::new(), 1),
        };
        apply_merge(&mut target, patch);
        let data = Value::Object(target);

        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data, version)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE data = VALUES(data), version = VALUES(version)
            "#,
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(Json(&data))
        .bind(version)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.upserted(path, data);
        Ok(version)
    }

    async fn delete(&self, path: &DocPath, precondition: Precondition) -> Result<bool, StoreError> {
        let result = match precondition {
            Precondition::Version(expected) => {
                let result = sqlx::query(
                    "DELETE FROM documents WHERE collection = ? AND doc_id = ? AND version = ?",
                )
                .bind(path.collection().as_str())
                .bind(path.id())
                .bind(expected)
                .execute(&self.pool)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::PreconditionFailed(path.to_string()));
                }
                result
            }
            Precondition::Absent => {
                if self.get(path).await?.is_some() {
                    return Err(StoreError::PreconditionFailed(path.to_string()));
                }
                return Ok(false);
            }
            Precondition::Any => {
                sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
                    .bind(path.collection().as_str())
                    .bind(path.id())
                    .execute(&self.pool)
                    .await?
            }
        };

        let removed = result.rows_affected() > 0;
        if removed {
            self.feed.publish(
                path.collection(),
                ChangeEvent {
                    id: path.id().to_string(),
                    change: Change::Deleted,
                },
            );
        }
        Ok(removed)
    }

    async fn list(
        &self,
        collection: &CollectionPath,
        range: &KeyRange,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let mut rows = sqlx::query_as::<_, (String, Json<Value>, u64)>(LIST_SQL)
        .bind(collection.as_str())
        .bind(range.start.as_deref())
        .bind(range.start.as_deref())
        .bind(range.end.as_deref())
        .bind(range.end.as_deref())
        .fetch(&self.pool);

        let mut docs = Vec::new();
        while let Some((id, Json(data), version)) = rows.try_next().await? {
            docs.push((id, Document { data, version }));
        }
        Ok(docs)
    }

    fn subscribe(&self, collection: &CollectionPath) -> ChangeStream {
        self.feed.subscribe(collection)
    }
}
