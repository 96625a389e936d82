use crate::models::{Subscription, SubscriptionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    Granted,
    Blocked,
    PaymentFailed,
    SubscriptionCanceled,
    NoSubscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub granted: bool,
    pub reason: AccessReason,
    pub blocked_until: Option<DateTime<Utc>>,
    /// The stored block has lapsed and should be cleared by the caller.
    #[serde(skip)]
    pub block_expired: bool,
}

/// Decides whether the member area is open to a subscriber at `now`.
pub fn check_access(subscription: &Subscription, now: DateTime<Utc>) -> AccessDecision {
    let mut block_expired = false;
    if let Some(until) = subscription.blocked_until {
        if now < until {
            return AccessDecision {
                granted: false,
                reason: AccessReason::Blocked,
                blocked_until: Some(until),
                block_expired: false,
            };
        }
        block_expired = true;
    }

    let reason = match subscription.status {
        SubscriptionStatus::Active | SubscriptionStatus::Trialing => AccessReason::Granted,
        SubscriptionStatus::PastDue => AccessReason::PaymentFailed,
        SubscriptionStatus::Canceled => AccessReason::SubscriptionCanceled,
        SubscriptionStatus::None => AccessReason::NoSubscription,
    };

    AccessDecision {
        granted: reason == AccessReason::Granted,
        reason,
        blocked_until: None,
        block_expired,
    }
}
