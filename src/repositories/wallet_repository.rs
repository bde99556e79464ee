//! Repository for wallet balances and their append-only transaction log.
//!
//! Balance mutations lock the wallet row, so the no-negative-balance check
//! holds under concurrent debits. Every mutation appends a transaction row
//! capturing `balance_after` at write time.

use crate::error::RepositoryError;
use crate::models::{Wallet, WalletTransaction, WalletTransactionType};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get or create a user's wallet, provisioning a zero balance on first
    /// access.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<Wallet, RepositoryError> {
        let existing = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(wallet) = existing {
            return Ok(wallet);
        }

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (id, user_id, balance)
            VALUES ($1, $2, 0)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id, user_id, balance, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(wallet)
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    /// Credit funds to a user's wallet in its own transaction.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<Wallet, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let wallet = self
            .credit_in_tx(&mut tx, user_id, amount, description, metadata)
            .await?;
        tx.commit().await?;

        Ok(wallet)
    }

    /// Credit funds within a caller-owned transaction. Used by refund
    /// approval so the credit commits or rolls back together with the
    /// earning reversal.
    pub async fn credit_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        amount: Decimal,
        description: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<Wallet, RepositoryError> {
        if amount <= Decimal::ZERO {
            return Err(RepositoryError::InvalidInput(
                "Credit amount must be positive".to_string(),
            ));
        }

        // Lock (or create) the wallet row
        let current = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;

        let updated = match current {
            Some(wallet) => {
                sqlx::query_as::<_, Wallet>(
                    r#"
                    UPDATE wallets
                    SET balance = balance + $2, updated_at = NOW()
                    WHERE user_id = $1
                    RETURNING id, user_id, balance, created_at, updated_at
                    "#,
                )
                .bind(wallet.user_id)
                .bind(amount)
                .fetch_one(&mut **tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, Wallet>(
                    r#"
                    INSERT INTO wallets (id, user_id, balance)
                    VALUES ($1, $2, $3)
                    RETURNING id, user_id, balance, created_at, updated_at
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(amount)
                .fetch_one(&mut **tx)
                .await?
            }
        };

        // Record the transaction with the balance captured at write time
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions
            (id, wallet_id, user_id, transaction_type, amount, balance_after, description, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(updated.id)
        .bind(user_id)
        .bind(WalletTransactionType::Credit.as_str())
        .bind(amount)
        .bind(updated.balance)
        .bind(description)
        .bind(metadata)
        .execute(&mut **tx)
        .await?;

        Ok(updated)
    }

    /// Debit funds from a user's wallet. Fails with no mutation when the
    /// balance is insufficient.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<Wallet, RepositoryError> {
        if amount <= Decimal::ZERO {
            return Err(RepositoryError::InvalidInput(
                "Debit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Re-read the balance under lock immediately before the debit
        let current = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Wallet not found".to_string()))?;

        if current.balance < amount {
            return Err(RepositoryError::BusinessRule(format!(
                "Insufficient balance: available {}, required {}",
                current.balance, amount
            )));
        }

        let updated = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = balance - $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING id, user_id, balance, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions
            (id, wallet_id, user_id, transaction_type, amount, balance_after, description, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(updated.id)
        .bind(user_id)
        .bind(WalletTransactionType::Debit.as_str())
        .bind(amount)
        .bind(updated.balance)
        .bind(description)
        .bind(metadata)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Transaction history for a user, newest first.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, RepositoryError> {
        let transactions = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT id, wallet_id, user_id, transaction_type, amount,
                   balance_after, description, metadata, created_at
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}
