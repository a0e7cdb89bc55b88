//! PostgreSQL store
//!
//! The cursor advance is a conditional `UPDATE ... WHERE next_occurrence_date = $expected
//! AND version = $version` executed in the same transaction as the ledger insert. Under
//! READ COMMITTED a concurrent writer blocks on the row lock, re-evaluates the predicate
//! against the committed row and matches zero rows, so only one worker ever records an
//! occurrence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    DomainError, Frequency, Interval, MaterializedTransaction, Money, RecurringDefinition,
    TransactionFilter,
};

use super::{AdvanceOutcome, CursorAdvance, DefinitionFilter, RecurringStore, StoreError};

/// Raw `recurring_transactions` row
#[derive(Debug, sqlx::FromRow)]
struct DefinitionRow {
    id: Uuid,
    user_id: Uuid,
    description: String,
    notes: Option<String>,
    amount: Decimal,
    frequency: String,
    recurrence_interval: i32,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    next_occurrence_date: NaiveDate,
    account_id: Uuid,
    category_id: Option<Uuid>,
    is_subscription: bool,
    active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DefinitionRow> for RecurringDefinition {
    type Error = StoreError;

    fn try_from(row: DefinitionRow) -> Result<Self, Self::Error> {
        let invalid = |source: DomainError| StoreError::InvalidRow { id: row.id, source };

        let amount = Money::new(row.amount).map_err(|e| invalid(e.into()))?;
        let frequency: Frequency = row.frequency.parse().map_err(invalid)?;
        let interval = Interval::new(i64::from(row.recurrence_interval)).map_err(invalid)?;

        Ok(RecurringDefinition {
            id: row.id,
            user_id: row.user_id,
            description: row.description,
            notes: row.notes,
            amount,
            frequency,
            interval,
            start_date: row.start_date,
            end_date: row.end_date,
            next_occurrence_date: row.next_occurrence_date,
            account_id: row.account_id,
            category_id: row.category_id,
            is_subscription: row.is_subscription,
            active: row.active,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Raw `transactions` row
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    recurring_transaction_id: Option<Uuid>,
    user_id: Uuid,
    amount: Decimal,
    transaction_date: NaiveDate,
    account_id: Uuid,
    category_id: Option<Uuid>,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for MaterializedTransaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let amount = Money::new(row.amount).map_err(|e| StoreError::InvalidRow {
            id: row.id,
            source: e.into(),
        })?;

        Ok(MaterializedTransaction {
            id: row.id,
            recurring_definition_id: row.recurring_transaction_id,
            user_id: row.user_id,
            amount,
            date: row.transaction_date,
            account_id: row.account_id,
            category_id: row.category_id,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

const DEFINITION_COLUMNS: &str = r#"
    id, user_id, description, notes, amount, frequency, recurrence_interval,
    start_date, end_date, next_occurrence_date, account_id, category_id,
    is_subscription, active, version, created_at, updated_at
"#;

/// PostgreSQL-backed [`RecurringStore`]
#[derive(Debug, Clone)]
pub struct PgRecurringStore {
    pool: PgPool,
}

impl PgRecurringStore {
    /// Create a new store with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_transaction(
        tx: &mut Transaction<'_, Postgres>,
        entry: &MaterializedTransaction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, recurring_transaction_id, user_id, amount, transaction_date,
                account_id, category_id, description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.recurring_definition_id)
        .bind(entry.user_id)
        .bind(entry.amount.value())
        .bind(entry.date)
        .bind(entry.account_id)
        .bind(entry.category_id)
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl RecurringStore for PgRecurringStore {
    async fn account_owned_by(&self, account_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1 AND user_id = $2)",
        )
        .bind(account_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn category_owned_by(
        &self,
        category_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1 AND user_id = $2)",
        )
        .bind(category_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_definition(&self, definition: &RecurringDefinition) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO recurring_transactions (
                id, user_id, description, notes, amount, frequency, recurrence_interval,
                start_date, end_date, next_occurrence_date, account_id, category_id,
                is_subscription, active, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(definition.id)
        .bind(definition.user_id)
        .bind(&definition.description)
        .bind(&definition.notes)
        .bind(definition.amount.value())
        .bind(definition.frequency.as_str())
        .bind(definition.interval.get() as i32)
        .bind(definition.start_date)
        .bind(definition.end_date)
        .bind(definition.next_occurrence_date)
        .bind(definition.account_id)
        .bind(definition.category_id)
        .bind(definition.is_subscription)
        .bind(definition.active)
        .bind(definition.version)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_definition(&self, id: Uuid) -> Result<Option<RecurringDefinition>, StoreError> {
        let sql = format!(
            "SELECT {} FROM recurring_transactions WHERE id = $1",
            DEFINITION_COLUMNS
        );
        let row: Option<DefinitionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(RecurringDefinition::try_from).transpose()
    }

    async fn list_definitions(
        &self,
        filter: &DefinitionFilter,
    ) -> Result<Vec<RecurringDefinition>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM recurring_transactions
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::date IS NULL OR next_occurrence_date <= $2)
              AND ($3::boolean IS NULL OR active = $3)
              AND ($4::boolean IS NULL OR is_subscription = $4)
            ORDER BY next_occurrence_date ASC, id ASC
            "#,
            DEFINITION_COLUMNS
        );
        let rows: Vec<DefinitionRow> = sqlx::query_as(&sql)
            .bind(filter.user_id)
            .bind(filter.due_on_or_before)
            .bind(filter.active)
            .bind(filter.is_subscription)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(RecurringDefinition::try_from).collect()
    }

    async fn update_definition(
        &self,
        definition: &RecurringDefinition,
        expected_cursor: NaiveDate,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE recurring_transactions
            SET description = $4,
                notes = $5,
                amount = $6,
                frequency = $7,
                recurrence_interval = $8,
                start_date = $9,
                end_date = $10,
                next_occurrence_date = $11,
                account_id = $12,
                category_id = $13,
                is_subscription = $14,
                active = $15,
                version = $16,
                updated_at = $17
            WHERE id = $1 AND next_occurrence_date = $2 AND version = $3
            "#,
        )
        .bind(definition.id)
        .bind(expected_cursor)
        .bind(expected_version)
        .bind(&definition.description)
        .bind(&definition.notes)
        .bind(definition.amount.value())
        .bind(definition.frequency.as_str())
        .bind(definition.interval.get() as i32)
        .bind(definition.start_date)
        .bind(definition.end_date)
        .bind(definition.next_occurrence_date)
        .bind(definition.account_id)
        .bind(definition.category_id)
        .bind(definition.is_subscription)
        .bind(definition.active)
        .bind(definition.version)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 1 {
            return Ok(());
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM recurring_transactions WHERE id = $1)",
        )
        .bind(definition.id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Err(StoreError::VersionConflict(definition.id))
        } else {
            Err(StoreError::DefinitionNotFound(definition.id))
        }
    }

    async fn delete_definition(&self, id: Uuid) -> Result<(), StoreError> {
        let rows_affected = sqlx::query("DELETE FROM recurring_transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::DefinitionNotFound(id));
        }
        Ok(())
    }

    async fn has_transactions(&self, definition_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE recurring_transaction_id = $1)",
        )
        .bind(definition_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn advance_cursor(&self, advance: CursorAdvance) -> Result<AdvanceOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE recurring_transactions
            SET next_occurrence_date = $3,
                active = $4,
                updated_at = NOW()
            WHERE id = $1
              AND next_occurrence_date = $2
              AND version = $5
              AND active
            "#,
        )
        .bind(advance.definition_id)
        .bind(advance.expected_cursor)
        .bind(advance.new_cursor)
        .bind(advance.still_active)
        .bind(advance.expected_version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tx.rollback().await?;
            return Ok(AdvanceOutcome::Conflict);
        }

        Self::insert_transaction(&mut tx, &advance.entry).await?;

        // Dropping `tx` on any error above rolls both statements back
        tx.commit().await?;

        Ok(AdvanceOutcome::Applied(advance.entry))
    }

    async fn deactivate(
        &self,
        id: Uuid,
        expected_cursor: NaiveDate,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE recurring_transactions
            SET active = false, updated_at = NOW()
            WHERE id = $1 AND next_occurrence_date = $2 AND version = $3 AND active
            "#,
        )
        .bind(id)
        .bind(expected_cursor)
        .bind(expected_version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<MaterializedTransaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, recurring_transaction_id, user_id, amount, transaction_date,
                   account_id, category_id, description, created_at
            FROM transactions
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::date IS NULL OR transaction_date >= $2)
              AND ($3::date IS NULL OR transaction_date <= $3)
              AND ($4::uuid IS NULL OR account_id = $4)
              AND ($5::uuid IS NULL OR category_id = $5)
              AND ($6::uuid IS NULL OR recurring_transaction_id = $6)
            ORDER BY transaction_date ASC, created_at ASC
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.account_id)
        .bind(filter.category_id)
        .bind(filter.recurring_definition_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MaterializedTransaction::try_from).collect()
    }
}
