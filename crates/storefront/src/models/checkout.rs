//! Multi-step checkout progress.
//!
//! Checkout runs contact, then shipping, then review. Each step's data is kept
//! in the session; a step can only be shown once every earlier step is
//! complete.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use emporium_core::{Email, ShippingMethodId};
use emporium_db::ShippingAddress;

/// A checkout step, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Contact,
    Shipping,
    Review,
}

impl CheckoutStep {
    pub const ALL: [Self; 3] = [Self::Contact, Self::Shipping, Self::Review];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Shipping => "shipping",
            Self::Review => "review",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Contact => "Contact",
            Self::Shipping => "Shipping",
            Self::Review => "Review",
        }
    }

    /// 1-based position for the progress indicator.
    #[must_use]
    pub const fn number(self) -> usize {
        match self {
            Self::Contact => 1,
            Self::Shipping => 2,
            Self::Review => 3,
        }
    }

    /// URL of the page for this step.
    #[must_use]
    pub fn url(self) -> String {
        format!("/checkout?step={}", self.as_str())
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckoutStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == s.trim())
            .ok_or_else(|| format!("unknown checkout step: {s}"))
    }
}

/// Contact step data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub email: Email,
    pub customer_name: String,
    pub phone: Option<String>,
}

/// Shipping step data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub address: ShippingAddress,
    pub shipping_method_id: ShippingMethodId,
}

/// Checkout progress stored in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutState {
    pub contact: Option<ContactDetails>,
    pub shipping: Option<ShippingDetails>,
    pub coupon_code: Option<String>,
}

impl CheckoutState {
    /// The earliest step still missing data, or review when all are done.
    #[must_use]
    pub const fn first_incomplete_step(&self) -> CheckoutStep {
        if self.contact.is_none() {
            CheckoutStep::Contact
        } else if self.shipping.is_none() {
            CheckoutStep::Shipping
        } else {
            CheckoutStep::Review
        }
    }

    /// Whether `step` may be shown.
    #[must_use]
    pub fn can_enter(&self, step: CheckoutStep) -> bool {
        step <= self.first_incomplete_step()
    }

    /// The step to show for a request: the requested one when reachable,
    /// otherwise the first incomplete one.
    #[must_use]
    pub fn resolve(&self, requested: Option<CheckoutStep>) -> CheckoutStep {
        match requested {
            Some(step) if self.can_enter(step) => step,
            _ => self.first_incomplete_step(),
        }
    }

    /// Whether the order can be placed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.contact.is_some() && self.shipping.is_some()
    }
}
