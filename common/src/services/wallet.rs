use sqlx::SqliteConnection;

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::helpers::{generate_reference, non_blank};
use crate::schema::{
    BalanceMismatch, CreditRequest, TopUpRequest, TransactionStatus, TransactionType, Wallet,
    WalletOverview, WalletTransaction,
};
use crate::Amount;

const RECENT_TRANSACTIONS: i64 = 5;
const MAX_PAGE_SIZE: i64 = 100;

/// Per-user wallets and their transaction ledger.
///
/// Every balance change is written in the same database transaction as the
/// ledger entry that justifies it, so `balance` always equals the sum of the
/// wallet's completed transactions.
#[derive(Clone)]
pub struct WalletService {
    db: Database,
}

impl WalletService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Wallet of `user_id` with its last transactions, created on first access.
    pub async fn get_wallet(&self, user_id: i64) -> ServiceResult<WalletOverview> {
        let mut conn = self.db.pool().acquire().await?;
        let wallet = ensure_wallet(&mut conn, user_id).await?;
        let transactions = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE wallet_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(wallet.id)
        .bind(RECENT_TRANSACTIONS)
        .fetch_all(&mut *conn)
        .await?;

        Ok(WalletOverview {
            wallet,
            transactions,
        })
    }

    pub async fn list_transactions(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<Vec<WalletTransaction>> {
        let mut conn = self.db.pool().acquire().await?;
        let wallet = ensure_wallet(&mut conn, user_id).await?;
        let transactions = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE wallet_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(wallet.id)
        .bind(limit.clamp(1, MAX_PAGE_SIZE))
        .bind(offset.max(0))
        .fetch_all(&mut *conn)
        .await?;
        Ok(transactions)
    }

    /// Records a pending deposit. The balance moves only once an admin validates it.
    pub async fn request_top_up(
        &self,
        user_id: i64,
        request: TopUpRequest,
    ) -> ServiceResult<WalletTransaction> {
        if !request.amount.is_positive() {
            return Err(ServiceError::BadRequest(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let mut conn = self.db.pool().acquire().await?;
        let wallet = ensure_wallet(&mut conn, user_id).await?;
        let reference =
            non_blank(request.reference).unwrap_or_else(|| generate_reference("TOPUP"));
        let transaction = insert_transaction(
            &mut conn,
            wallet.id,
            request.amount,
            TransactionType::Deposit,
            TransactionStatus::Pending,
            Some(reference),
            non_blank(request.description),
        )
        .await?;

        log::info!(
            "Top-up requested: user={} wallet={} amount={} transaction={}",
            user_id,
            wallet.id,
            request.amount,
            transaction.id
        );
        Ok(transaction)
    }

    /// Credits (or debits, for negative amounts) a wallet immediately.
    pub async fn admin_credit(&self, request: CreditRequest) -> ServiceResult<WalletTransaction> {
        if self.db.get_user_by_id(request.user_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "User {} not found",
                request.user_id
            )));
        }

        let kind = if request.amount.is_negative() {
            TransactionType::Adjustment
        } else {
            TransactionType::Deposit
        };

        let mut tx = self.db.begin().await?;
        let wallet = ensure_wallet(&mut tx, request.user_id).await?;
        let transaction = insert_transaction(
            &mut tx,
            wallet.id,
            request.amount,
            kind,
            TransactionStatus::Completed,
            non_blank(request.reference),
            non_blank(request.description),
        )
        .await?;
        apply_to_balance(&mut tx, wallet.id, request.amount).await?;
        tx.commit().await?;

        log::info!(
            "Admin credit applied: user={} wallet={} amount={} type={:?}",
            request.user_id,
            wallet.id,
            request.amount,
            kind
        );
        Ok(transaction)
    }

    /// Completes a pending transaction and applies its amount to the balance.
    pub async fn validate_transaction(&self, transaction_id: i64) -> ServiceResult<WalletTransaction> {
        let mut tx = self.db.begin().await?;
        let completed =
            settle_pending(&mut tx, transaction_id, TransactionStatus::Completed).await?;
        apply_to_balance(&mut tx, completed.wallet_id, completed.amount).await?;
        tx.commit().await?;

        log::info!(
            "Transaction {} validated: wallet={} amount={}",
            transaction_id,
            completed.wallet_id,
            completed.amount
        );
        Ok(completed)
    }

    /// Marks a pending transaction failed. The balance is left untouched.
    pub async fn reject_transaction(&self, transaction_id: i64) -> ServiceResult<WalletTransaction> {
        let mut tx = self.db.begin().await?;
        let failed = settle_pending(&mut tx, transaction_id, TransactionStatus::Failed).await?;
        tx.commit().await?;

        log::info!("Transaction {} rejected", transaction_id);
        Ok(failed)
    }

    /// Pending transactions across all wallets, oldest first.
    pub async fn list_pending(&self) -> ServiceResult<Vec<WalletTransaction>> {
        let pending = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE status = ? ORDER BY created_at, id",
        )
        .bind(TransactionStatus::Pending)
        .fetch_all(self.db.pool())
        .await?;
        Ok(pending)
    }

    /// Wallets whose balance differs from the sum of their completed transactions.
    pub async fn audit(&self) -> ServiceResult<Vec<BalanceMismatch>> {
        let rows = sqlx::query_as::<_, BalanceMismatch>(
            r#"
            SELECT
                w.id AS wallet_id,
                w.user_id AS user_id,
                w.balance AS balance,
                COALESCE(
                    (SELECT SUM(t.amount) FROM wallet_transactions t
                     WHERE t.wallet_id = w.id AND t.status = 'completed'),
                    0
                ) AS ledger_total
            FROM wallets w
            ORDER BY w.id
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        let mismatches: Vec<BalanceMismatch> = rows
            .into_iter()
            .filter(|row| row.balance != row.ledger_total)
            .collect();
        for mismatch in &mismatches {
            log::warn!(
                "Wallet {} balance {} does not match ledger total {}",
                mismatch.wallet_id,
                mismatch.balance,
                mismatch.ledger_total
            );
        }
        Ok(mismatches)
    }
}

/// Debits `amount` from the user's wallet inside the caller's transaction.
pub(crate) async fn pay_with_wallet(
    conn: &mut SqliteConnection,
    user_id: i64,
    amount: Amount,
    reference: Option<String>,
    description: Option<String>,
) -> ServiceResult<WalletTransaction> {
    let wallet = ensure_wallet(conn, user_id).await?;
    if wallet.balance < amount {
        return Err(ServiceError::BadRequest(format!(
            "Insufficient wallet balance: {} available, {} required",
            wallet.balance, amount
        )));
    }

    let debit = amount.checked_neg()?;
    let transaction = insert_transaction(
        conn,
        wallet.id,
        debit,
        TransactionType::Payment,
        TransactionStatus::Completed,
        reference,
        description,
    )
    .await?;
    apply_to_balance(conn, wallet.id, debit).await?;
    Ok(transaction)
}

async fn ensure_wallet(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<Wallet> {
    // The unique key on user_id turns a concurrent first access into a no-op insert.
    sqlx::query("INSERT INTO wallets (user_id, balance) VALUES (?, 0) ON CONFLICT(user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    wallet_id: i64,
    amount: Amount,
    kind: TransactionType,
    status: TransactionStatus,
    reference: Option<String>,
    description: Option<String>,
) -> sqlx::Result<WalletTransaction> {
    sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions (wallet_id, amount, type, status, reference, description)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(wallet_id)
    .bind(amount)
    .bind(kind)
    .bind(status)
    .bind(reference)
    .bind(description)
    .fetch_one(&mut *conn)
    .await
}

/// Adds `amount` to the stored balance. Overflow is refused instead of written.
async fn apply_to_balance(
    conn: &mut SqliteConnection,
    wallet_id: i64,
    amount: Amount,
) -> ServiceResult<Wallet> {
    let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = ?")
        .bind(wallet_id)
        .fetch_one(&mut *conn)
        .await?;
    let balance = wallet.balance.checked_add(amount).map_err(|_| {
        ServiceError::BadRequest(format!(
            "Balance of wallet {} would overflow: {} + {}",
            wallet_id, wallet.balance, amount
        ))
    })?;

    let updated = sqlx::query_as::<_, Wallet>(
        r#"
        UPDATE wallets
        SET balance = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(balance)
    .bind(wallet_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(updated)
}

/// Moves a transaction out of `Pending`. The conditional update is the first
/// statement of the caller's transaction, so only one settlement can win.
async fn settle_pending(
    conn: &mut SqliteConnection,
    transaction_id: i64,
    status: TransactionStatus,
) -> ServiceResult<WalletTransaction> {
    let settled = sqlx::query_as::<_, WalletTransaction>(
        r#"
        UPDATE wallet_transactions
        SET status = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND status = ?
        RETURNING *
        "#,
    )
    .bind(status)
    .bind(transaction_id)
    .bind(TransactionStatus::Pending)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(transaction) = settled {
        return Ok(transaction);
    }

    let current: Option<TransactionStatus> =
        sqlx::query_scalar("SELECT status FROM wallet_transactions WHERE id = ?")
            .bind(transaction_id)
            .fetch_optional(&mut *conn)
            .await?;
    Err(match current {
        Some(current) => ServiceError::BadRequest(format!(
            "Transaction {} is already {}",
            transaction_id, current
        )),
        None => ServiceError::NotFound(format!("Transaction {} not found", transaction_id)),
    })
}
