use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::helpers::non_blank;
use crate::schema::{
    Campaign, CampaignWithFees, Fee, FeePayment, FeeStatus, FeeView, FinanceSummary, NewCampaign,
    PaymentMethod, Role, StatusTotal, User,
};
use crate::services::associations::authorize;
use crate::services::wallet::pay_with_wallet;
use crate::Amount;

const FEE_VIEW_SELECT: &str = r#"
    SELECT
        f.id, f.campaign_id, c.title AS campaign_title, c.association_id,
        f.user_id, u.username, f.amount, f.status, f.payment_method, f.reference,
        c.due_date, f.paid_at, f.created_at
    FROM fees f
    JOIN campaigns c ON c.id = f.campaign_id
    JOIN users u ON u.id = f.user_id
"#;

/// Fee campaigns and the payment of the fees they create.
#[derive(Clone)]
pub struct FinanceService {
    db: Database,
}

impl FinanceService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates a campaign and one pending fee for every current member.
    pub async fn create_campaign(
        &self,
        actor: &User,
        association_id: i64,
        campaign: NewCampaign,
    ) -> ServiceResult<CampaignWithFees> {
        authorize(&self.db, actor, association_id, Role::FINANCE).await?;

        let title = campaign.title.trim();
        if title.is_empty() {
            return Err(ServiceError::BadRequest(
                "Campaign title must not be empty".to_string(),
            ));
        }
        if !campaign.amount.is_positive() {
            return Err(ServiceError::BadRequest(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let created = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (association_id, title, description, amount, due_date, created_by)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(association_id)
        .bind(title)
        .bind(non_blank(campaign.description))
        .bind(campaign.amount)
        .bind(campaign.due_date)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await?;

        let member_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM memberships WHERE association_id = ? ORDER BY id",
        )
        .bind(association_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut fees = Vec::with_capacity(member_ids.len());
        for user_id in member_ids {
            let fee = sqlx::query_as::<_, Fee>(
                r#"
                INSERT INTO fees (campaign_id, user_id, amount, status)
                VALUES (?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(created.id)
            .bind(user_id)
            .bind(created.amount)
            .bind(FeeStatus::Pending)
            .fetch_one(&mut *tx)
            .await?;
            fees.push(fee);
        }
        tx.commit().await?;

        log::info!(
            "Campaign {} '{}' created in association {} with {} fees of {}",
            created.id,
            created.title,
            association_id,
            fees.len(),
            created.amount
        );
        Ok(CampaignWithFees {
            campaign: created,
            fees,
        })
    }

    pub async fn list_campaigns(
        &self,
        actor: &User,
        association_id: i64,
    ) -> ServiceResult<Vec<Campaign>> {
        authorize(&self.db, actor, association_id, Role::ANY).await?;
        let campaigns = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE association_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(association_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(campaigns)
    }

    pub async fn list_campaign_fees(
        &self,
        actor: &User,
        campaign_id: i64,
    ) -> ServiceResult<Vec<FeeView>> {
        let campaign = self.get_campaign(campaign_id).await?;
        authorize(&self.db, actor, campaign.association_id, Role::FINANCE).await?;

        let fees = sqlx::query_as::<_, FeeView>(&format!(
            "{} WHERE f.campaign_id = ? ORDER BY u.username",
            FEE_VIEW_SELECT
        ))
        .bind(campaign_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(fees)
    }

    /// Fees owed or paid by `user_id`, newest first.
    pub async fn list_user_fees(&self, user_id: i64) -> ServiceResult<Vec<FeeView>> {
        let fees = sqlx::query_as::<_, FeeView>(&format!(
            "{} WHERE f.user_id = ? ORDER BY f.created_at DESC, f.id DESC",
            FEE_VIEW_SELECT
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(fees)
    }

    /// Settles a fee from the member's wallet in a single database transaction.
    pub async fn pay_fee_with_wallet(&self, user_id: i64, fee_id: i64) -> ServiceResult<FeePayment> {
        let mut tx = self.db.begin().await?;
        let fee = get_fee(&mut tx, fee_id).await?;
        ensure_payable_by(&fee, user_id)?;

        let transaction = pay_with_wallet(
            &mut tx,
            user_id,
            fee.amount,
            Some(format!("FEE-{}", fee.id)),
            Some(format!("Payment of fee {}", fee.id)),
        )
        .await?;

        let paid = sqlx::query_as::<_, Fee>(
            r#"
            UPDATE fees
            SET status = ?, payment_method = ?, reference = ?,
                paid_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status IN (?, ?)
            RETURNING *
            "#,
        )
        .bind(FeeStatus::Paid)
        .bind(PaymentMethod::Wallet)
        .bind(&transaction.reference)
        .bind(fee.id)
        .bind(FeeStatus::Pending)
        .bind(FeeStatus::Overdue)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::BadRequest(format!("Fee {} is no longer payable", fee.id)))?;
        tx.commit().await?;

        log::info!(
            "Fee {} paid from wallet by user {}: amount={} transaction={}",
            fee.id,
            user_id,
            fee.amount,
            transaction.id
        );
        Ok(FeePayment {
            fee: paid,
            transaction,
        })
    }

    /// Records that the member paid outside the platform. A treasurer
    /// confirms it later with `validate_fee_payment`.
    pub async fn declare_external_payment(
        &self,
        user_id: i64,
        fee_id: i64,
        reference: &str,
    ) -> ServiceResult<Fee> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ServiceError::BadRequest(
                "A payment reference is required".to_string(),
            ));
        }

        let mut conn = self.db.pool().acquire().await?;
        let fee = get_fee(&mut conn, fee_id).await?;
        ensure_payable_by(&fee, user_id)?;

        let updated = sqlx::query_as::<_, Fee>(
            r#"
            UPDATE fees
            SET status = ?, payment_method = ?, reference = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status IN (?, ?)
            RETURNING *
            "#,
        )
        .bind(FeeStatus::Processing)
        .bind(PaymentMethod::External)
        .bind(reference)
        .bind(fee.id)
        .bind(FeeStatus::Pending)
        .bind(FeeStatus::Overdue)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ServiceError::BadRequest(format!("Fee {} is no longer payable", fee.id)))?;

        log::info!(
            "External payment declared for fee {} by user {}: reference={}",
            fee.id,
            user_id,
            reference
        );
        Ok(updated)
    }

    /// Confirms payment of a fee. Only finance roles of the association may do this.
    pub async fn validate_fee_payment(&self, actor: &User, fee_id: i64) -> ServiceResult<Fee> {
        let mut conn = self.db.pool().acquire().await?;
        let fee = get_fee(&mut conn, fee_id).await?;
        drop(conn);

        let campaign = self.get_campaign(fee.campaign_id).await?;
        authorize(&self.db, actor, campaign.association_id, Role::FINANCE).await?;

        if fee.status == FeeStatus::Paid {
            return Err(ServiceError::BadRequest(format!(
                "Fee {} is already paid",
                fee.id
            )));
        }

        let paid = sqlx::query_as::<_, Fee>(
            r#"
            UPDATE fees
            SET status = ?, payment_method = COALESCE(payment_method, ?),
                paid_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status != ?
            RETURNING *
            "#,
        )
        .bind(FeeStatus::Paid)
        .bind(PaymentMethod::External)
        .bind(fee.id)
        .bind(FeeStatus::Paid)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| ServiceError::BadRequest(format!("Fee {} is already paid", fee.id)))?;

        log::info!("Fee {} validated by {}", fee.id, actor.username);
        Ok(paid)
    }

    /// Flags pending fees of campaigns whose due date is before `today`.
    pub async fn mark_overdue(&self, today: NaiveDate) -> ServiceResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE fees
            SET status = ?, updated_at = CURRENT_TIMESTAMP
            WHERE status = ?
              AND campaign_id IN (
                  SELECT id FROM campaigns WHERE due_date IS NOT NULL AND due_date < ?
              )
            "#,
        )
        .bind(FeeStatus::Overdue)
        .bind(FeeStatus::Pending)
        .bind(today)
        .execute(self.db.pool())
        .await?;

        let count = result.rows_affected();
        log::info!("Marked {} fees overdue (due before {})", count, today);
        Ok(count)
    }

    pub async fn summary(&self, actor: &User, association_id: i64) -> ServiceResult<FinanceSummary> {
        authorize(&self.db, actor, association_id, Role::ANY).await?;

        let campaigns: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE association_id = ?")
                .bind(association_id)
                .fetch_one(self.db.pool())
                .await?;

        let by_status = sqlx::query_as::<_, StatusTotal>(
            r#"
            SELECT f.status AS status, COUNT(*) AS count, COALESCE(SUM(f.amount), 0) AS total
            FROM fees f
            JOIN campaigns c ON c.id = f.campaign_id
            WHERE c.association_id = ?
            GROUP BY f.status
            ORDER BY f.status
            "#,
        )
        .bind(association_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut collected = Amount::ZERO;
        let mut outstanding = Amount::ZERO;
        for entry in &by_status {
            if entry.status == FeeStatus::Paid {
                collected = collected.checked_add(entry.total)?;
            } else {
                outstanding = outstanding.checked_add(entry.total)?;
            }
        }

        Ok(FinanceSummary {
            association_id,
            campaigns,
            collected,
            outstanding,
            by_status,
        })
    }

    async fn get_campaign(&self, campaign_id: i64) -> ServiceResult<Campaign> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = ?")
            .bind(campaign_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Campaign {} not found", campaign_id)))
    }
}

async fn get_fee(conn: &mut SqliteConnection, fee_id: i64) -> ServiceResult<Fee> {
    sqlx::query_as::<_, Fee>("SELECT * FROM fees WHERE id = ?")
        .bind(fee_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Fee {} not found", fee_id)))
}

fn ensure_payable_by(fee: &Fee, user_id: i64) -> ServiceResult<()> {
    if fee.user_id != user_id {
        return Err(ServiceError::Forbidden(format!(
            "Fee {} belongs to another member",
            fee.id
        )));
    }
    if !fee.status.is_payable() {
        return Err(ServiceError::BadRequest(format!(
            "Fee {} is already {}",
            fee.id, fee.status
        )));
    }
    Ok(())
}
