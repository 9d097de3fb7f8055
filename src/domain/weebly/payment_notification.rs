//! Payment notification records.
//!
//! Every purchase or refund the app takes through the App Center must be
//! reported back to the platform so it can settle the developer payout.
//! A notification is recorded first and delivered later; delivery flips
//! `notified` exactly once.
//!
//! # Design Decisions
//!
//! - **Money in cents**: amounts are stored as i64 cents (not floats)
//! - **Payable is derived**: always 30% of gross, rounded half away from zero
//! - **Bounded amounts**: gross fits ten digits with two decimals

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{NotificationId, SiteId, Timestamp, ValidationError};

/// Share of the gross amount payable to the platform, in tenths.
const PAYABLE_SHARE_TENTHS: i64 = 3;

pub const DEFAULT_CURRENCY: &str = "USD";

/// Largest gross amount accepted, in cents (99,999,999.99).
pub const MAX_GROSS_CENTS: i64 = 9_999_999_999;

/// Longest `name` or `detail`, in characters.
pub const MAX_TEXT_LEN: usize = 256;

/// Monetary amount in the smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Amount in major units, as sent on the wire.
    pub fn as_major_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// The platform's share of this amount, rounded to the cent.
    ///
    /// Returns `None` when the amount is too large to scale.
    pub fn payable_share(&self) -> Option<Amount> {
        let scaled = self.0.checked_mul(PAYABLE_SHARE_TENTHS)?;
        let rounded = if scaled >= 0 {
            scaled.checked_add(5)? / 10
        } else {
            scaled.checked_sub(5)? / 10
        };
        Some(Amount(rounded))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// How the charge was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Single,
    Setup,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Single => "single",
            PaymentKind::Setup => "setup",
        }
    }
}

impl FromStr for PaymentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(PaymentKind::Single),
            "setup" => Ok(PaymentKind::Setup),
            other => Err(ValidationError::invalid_format(
                "kind",
                format!("unknown payment kind '{}'", other),
            )),
        }
    }
}

/// Billing term the charge covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTerm {
    Month,
    Year,
    Forever,
    Refund,
}

impl PaymentTerm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTerm::Month => "month",
            PaymentTerm::Year => "year",
            PaymentTerm::Forever => "forever",
            PaymentTerm::Refund => "refund",
        }
    }
}

impl FromStr for PaymentTerm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(PaymentTerm::Month),
            "year" => Ok(PaymentTerm::Year),
            "forever" => Ok(PaymentTerm::Forever),
            "refund" => Ok(PaymentTerm::Refund),
            other => Err(ValidationError::invalid_format(
                "term",
                format!("unknown payment term '{}'", other),
            )),
        }
    }
}

/// The `method` field of a payment notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Purchase,
    Refund,
    TestPurchase,
    TestRefund,
}

impl PaymentMethod {
    pub fn resolve(is_purchase: bool, test_mode: bool) -> Self {
        match (is_purchase, test_mode) {
            (true, false) => PaymentMethod::Purchase,
            (false, false) => PaymentMethod::Refund,
            (true, true) => PaymentMethod::TestPurchase,
            (false, true) => PaymentMethod::TestRefund,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Purchase => "purchase",
            PaymentMethod::Refund => "refund",
            PaymentMethod::TestPurchase => "testpurchase",
            PaymentMethod::TestRefund => "testrefund",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment event as the host application reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaymentNotification {
    pub site_id: SiteId,
    pub name: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default = "default_true")]
    pub is_purchase: bool,
    #[serde(default)]
    pub kind: Option<PaymentKind>,
    #[serde(default)]
    pub term: Option<PaymentTerm>,
    pub gross_amount: Amount,
    #[serde(default)]
    pub currency: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A recorded payment awaiting (or past) delivery to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub id: NotificationId,
    pub site_id: SiteId,
    pub name: String,
    pub detail: Option<String>,
    pub is_purchase: bool,
    pub kind: Option<PaymentKind>,
    pub term: Option<PaymentTerm>,
    pub gross_amount: Amount,
    pub payable_amount: Amount,
    pub currency: String,
    pub notified: bool,
    pub notified_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl PaymentNotification {
    /// Validates a reported payment and derives the payable amount.
    ///
    /// # Errors
    ///
    /// - `EmptyField` when `name` is blank
    /// - `InvalidFormat` when `gross_amount` is negative or above
    ///   [`MAX_GROSS_CENTS`], `name` or `detail` is longer than
    ///   [`MAX_TEXT_LEN`], or `currency` is not a three-letter code
    pub fn create(new: NewPaymentNotification) -> Result<Self, ValidationError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::empty_field("name"));
        }
        check_length("name", &name)?;
        let detail = new.detail.filter(|d| !d.trim().is_empty());
        if let Some(detail) = &detail {
            check_length("detail", detail)?;
        }

        if new.gross_amount.cents() < 0 {
            return Err(ValidationError::invalid_format(
                "gross_amount",
                "must not be negative",
            ));
        }
        if new.gross_amount.cents() > MAX_GROSS_CENTS {
            return Err(ValidationError::invalid_format(
                "gross_amount",
                format!("must not exceed {}", Amount::from_cents(MAX_GROSS_CENTS)),
            ));
        }
        let payable_amount = new.gross_amount.payable_share().ok_or_else(|| {
            ValidationError::invalid_format("gross_amount", "too large to compute payable share")
        })?;

        let currency = match new.currency.map(|c| c.trim().to_ascii_uppercase()) {
            Some(c) if c.is_empty() => DEFAULT_CURRENCY.to_string(),
            Some(c) if c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()) => c,
            Some(c) => {
                return Err(ValidationError::invalid_format(
                    "currency",
                    format!("'{}' is not a currency code", c),
                ))
            }
            None => DEFAULT_CURRENCY.to_string(),
        };

        Ok(Self {
            id: NotificationId::new(),
            site_id: new.site_id,
            name,
            detail,
            is_purchase: new.is_purchase,
            kind: new.kind,
            term: new.term,
            gross_amount: new.gross_amount,
            payable_amount,
            currency,
            notified: false,
            notified_at: None,
            created_at: Timestamp::now(),
        })
    }

    pub fn method(&self, test_mode: bool) -> PaymentMethod {
        PaymentMethod::resolve(self.is_purchase, test_mode)
    }

    /// Marks the notification as delivered.
    pub fn mark_notified(&mut self, at: Timestamp) {
        self.notified = true;
        self.notified_at = Some(at);
    }
}

fn check_length(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ValidationError::invalid_format(
            field,
            format!("must be at most {} characters", MAX_TEXT_LEN),
        ));
    }
    Ok(())
}

impl fmt::Display for PaymentNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "payment_for_site_{}_{}_{}",
            self.site_id, self.payable_amount, self.currency
        )
    }
}
