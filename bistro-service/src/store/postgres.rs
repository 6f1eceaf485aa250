use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use super::{
    string_field, with_id, without_id, Collection, DeleteResult, Document, DocumentStore, Filter,
    InsertOneResult, StoreError, StoreResult, UpdateResult,
};

/// JSONB-per-collection store. Table names come from [`Collection::table`],
/// never from request input.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}

/// `doc->>'field'`, spelled exactly like the expression indexes in the
/// migrations so the planner can use them. Field names are compile-time
/// constants, never request input.
fn text_field(field: &'static str) -> String {
    format!("doc->>'{}'", field.replace('\'', "''"))
}

/// SQL predicate for `filter`, numbering its bind parameters from `first`.
fn where_clause(filter: &Filter, first: usize) -> String {
    match filter {
        Filter::All => "TRUE".to_string(),
        Filter::Id(_) => format!("id = ${first}"),
        Filter::Eq(field, _) => format!("{} = ${first}", text_field(*field)),
    }
}

fn bind_filter<'q>(
    query: Query<'q, Postgres, PgArguments>,
    filter: &'q Filter,
) -> Query<'q, Postgres, PgArguments> {
    match filter {
        Filter::All => query,
        Filter::Id(id) => query.bind(*id),
        Filter::Eq(_, value) => query.bind(value.as_str()),
    }
}

fn decode_row(collection: Collection, row: &PgRow) -> StoreResult<Document> {
    let id: Uuid = row.try_get("id")?;
    let doc: Value = row.try_get("doc")?;
    match doc {
        Value::Object(map) => Ok(with_id(id, &map)),
        other => Err(StoreError::Corrupt {
            collection: collection.table(),
            id,
            reason: format!("expected object, found {other}"),
        }),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        let sql = format!(
            "SELECT id, doc FROM {} WHERE {} ORDER BY seq",
            collection.table(),
            where_clause(filter, 1)
        );
        let rows = bind_filter(sqlx::query(&sql), filter)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| decode_row(collection, row)).collect()
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        let sql = format!(
            "SELECT id, doc FROM {} WHERE {} ORDER BY seq LIMIT 1",
            collection.table(),
            where_clause(filter, 1)
        );
        let row = bind_filter(sqlx::query(&sql), filter)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_row(collection, &row)).transpose()
    }

    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> StoreResult<InsertOneResult> {
        let id = Uuid::new_v4();
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", collection.table());
        sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(without_id(doc)))
            .execute(&self.pool)
            .await?;
        Ok(InsertOneResult::new(id))
    }

    async fn insert_if_absent(
        &self,
        collection: Collection,
        key_field: &'static str,
        doc: Document,
    ) -> StoreResult<Option<InsertOneResult>> {
        let id = Uuid::new_v4();
        let key = string_field(&doc, key_field).unwrap_or_default().to_string();
        // The NOT EXISTS probe covers collections without a unique index; for
        // users the unique email index turns a concurrent duplicate into a
        // no-op via ON CONFLICT.
        let sql = format!(
            "INSERT INTO {table} (id, doc)
             SELECT $1, $2
             WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE {key} = $3)
             ON CONFLICT DO NOTHING",
            table = collection.table(),
            key = text_field(key_field)
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(Value::Object(without_id(doc)))
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Ok(None)
        } else {
            Ok(Some(InsertOneResult::new(id)))
        }
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<DeleteResult> {
        let sql = format!(
            "DELETE FROM {table} WHERE id IN (SELECT id FROM {table} WHERE {predicate} ORDER BY seq LIMIT 1)",
            table = collection.table(),
            predicate = where_clause(filter, 1)
        );
        let result = bind_filter(sqlx::query(&sql), filter)
            .execute(&self.pool)
            .await?;
        Ok(DeleteResult::new(result.rows_affected()))
    }

    async fn set_field(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &'static str,
        value: Value,
    ) -> StoreResult<UpdateResult> {
        let table = collection.table();
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT id, doc->($1::text) AS current FROM {table} WHERE {} ORDER BY seq LIMIT 1 FOR UPDATE",
            where_clause(filter, 2)
        );
        let row = bind_filter(sqlx::query(&select).bind(field), filter)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match row {
            None => UpdateResult::new(0, 0),
            Some(row) => {
                let id: Uuid = row.try_get("id")?;
                let current: Option<Value> = row.try_get("current")?;
                if current.as_ref() == Some(&value) {
                    UpdateResult::new(1, 0)
                } else {
                    let update = format!(
                        "UPDATE {table} SET doc = doc || jsonb_build_object($1::text, $2::jsonb) WHERE id = $3"
                    );
                    sqlx::query(&update)
                        .bind(field)
                        .bind(&value)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    UpdateResult::new(1, 1)
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}
