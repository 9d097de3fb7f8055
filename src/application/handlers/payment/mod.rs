//! Payment notification handlers.
//!
//! Payments are recorded by the host application and delivered to the
//! platform separately, either one at a time or in a pass over everything
//! still pending.

mod errors;
mod notify_payment;
mod notify_unnotified;
mod record_payment;

pub use errors::{DeliveryAttempt, NotificationError, TokenSource};
pub use notify_payment::{
    NotificationSettings, NotifyPaymentCommand, NotifyPaymentHandler, NotifyPaymentResult,
    SelectedCredential,
};
pub use notify_unnotified::{NotifySummary, NotifyUnnotifiedHandler};
pub use record_payment::RecordPaymentHandler;
