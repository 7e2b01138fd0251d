use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{Amount, WalletTransaction};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub association_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub amount: Amount,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: Amount,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "lowercase")]
pub enum FeeStatus {
    Pending,
    Processing,
    Paid,
    Overdue,
}

impl FeeStatus {
    /// Whether a member may still settle the fee.
    pub fn is_payable(&self) -> bool {
        matches!(self, FeeStatus::Pending | FeeStatus::Overdue)
    }
}

impl fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeeStatus::Pending => "pending",
            FeeStatus::Processing => "processing",
            FeeStatus::Paid => "paid",
            FeeStatus::Overdue => "overdue",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Fee {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub amount: Amount,
    pub status: FeeStatus,
    pub payment_method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Fee joined with its campaign and member, as listed to users.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeeView {
    pub id: i64,
    pub campaign_id: i64,
    pub campaign_title: String,
    pub association_id: i64,
    pub user_id: i64,
    pub username: String,
    pub amount: Amount,
    pub status: FeeStatus,
    pub payment_method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignWithFees {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub fees: Vec<Fee>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeePayment {
    pub fee: Fee,
    pub transaction: WalletTransaction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalPaymentRequest {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusTotal {
    pub status: FeeStatus,
    pub count: i64,
    pub total: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinanceSummary {
    pub association_id: i64,
    pub campaigns: i64,
    pub collected: Amount,
    pub outstanding: Amount,
    pub by_status: Vec<StatusTotal>,
}
