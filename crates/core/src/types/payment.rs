//! Order payment sub-document and its partial-update merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PaymentStatus, TransitionError};

/// Payment method recorded when the client does not name one.
pub const DEFAULT_PAYMENT_METHOD: &str = "Dummy";

/// Errors produced when building or updating a [`Payment`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The payment method label is blank.
    #[error("payment method cannot be blank")]
    BlankMethod,
    /// The status change is not allowed.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Payment state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment status.
    pub status: PaymentStatus,
    /// Payment method label (e.g. "Card", "Dummy").
    pub method: String,
    /// When the payment became `Paid`. Sticky once set.
    pub paid_at: Option<DateTime<Utc>>,
    /// Payment provider reference.
    pub transaction_id: Option<String>,
}

/// Partial update of a [`Payment`]. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentUpdate {
    /// New status.
    pub status: Option<PaymentStatus>,
    /// New method label.
    pub method: Option<String>,
    /// New provider reference.
    pub transaction_id: Option<String>,
    /// Remove the recorded payment time.
    pub clear_paid_at: bool,
}

impl Payment {
    /// A fresh, unpaid payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::BlankMethod` if `method` is blank.
    pub fn pending(method: &str) -> Result<Self, PaymentError> {
        Ok(Self {
            status: PaymentStatus::Pending,
            method: non_blank_method(method)?,
            paid_at: None,
            transaction_id: None,
        })
    }

    /// Merge `update` into this payment.
    ///
    /// `paid_at` is stamped with `now` exactly when the merged status becomes
    /// `Paid` coming from another status. Otherwise it is preserved, unless
    /// the update explicitly asks to clear it.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Transition` for an illegal status change and
    /// `PaymentError::BlankMethod` for a blank method label.
    pub fn apply(&self, update: &PaymentUpdate, now: DateTime<Utc>) -> Result<Self, PaymentError> {
        let status = match update.status {
            Some(next) if next != self.status => {
                if !self.status.can_transition_to(next) {
                    return Err(TransitionError::Payment {
                        from: self.status,
                        to: next,
                    }
                    .into());
                }
                next
            }
            _ => self.status,
        };

        let method = match &update.method {
            Some(method) => non_blank_method(method)?,
            None => self.method.clone(),
        };

        let transaction_id = update
            .transaction_id
            .clone()
            .or_else(|| self.transaction_id.clone());

        let mut paid_at = if update.clear_paid_at {
            None
        } else {
            self.paid_at
        };
        if status == PaymentStatus::Paid && self.status != PaymentStatus::Paid {
            paid_at = Some(now);
        }

        Ok(Self {
            status,
            method,
            paid_at,
            transaction_id,
        })
    }
}

fn non_blank_method(method: &str) -> Result<String, PaymentError> {
    let trimmed = method.trim();
    if trimmed.is_empty() {
        return Err(PaymentError::BlankMethod);
    }
    Ok(trimmed.to_owned())
}
