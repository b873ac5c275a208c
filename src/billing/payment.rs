//! Payment records for verification purchases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::billing::gateway::ChargeIntent;

/// Payment lifecycle. A payment reaches a terminal status exactly once;
/// the terminal transition is the only trigger for a membership upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("Unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_key: String,
    /// Final charged amount in minor currency units, after any discount.
    pub amount: i64,
    pub currency: String,
    /// Normalized code of the coupon applied, for audit.
    pub coupon_code: Option<String>,
    /// External transaction reference from the gateway.
    pub charge_ref: String,
    /// Client-side continuation: a client secret or a redirect URL,
    /// whichever the gateway issued.
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
    pub status: PaymentStatus,
    /// User-facing reason recorded on a failed confirmation.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(
        user_key: &str,
        amount: i64,
        currency: &str,
        coupon_code: Option<String>,
        intent: ChargeIntent,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_key: user_key.to_string(),
            amount,
            currency: currency.to_string(),
            coupon_code,
            charge_ref: intent.reference,
            client_secret: intent.client_secret,
            redirect_url: intent.redirect_url,
            status: PaymentStatus::Pending,
            failure_reason: None,
            created_at: Utc::now(),
            confirmed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Succeeded.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "succeeded".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::Succeeded
        );
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }
}
