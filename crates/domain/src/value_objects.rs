//! Value objects shared across the booking domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Money amount represented in minor units (cents) to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a new Money amount from minor units.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a new Money amount from whole currency units.
    pub fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor-unit portion (remainder after whole units).
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the given percentage of this amount, truncated to whole minor units.
    pub fn percent(&self, pct: u8) -> Money {
        Money(self.0 * i64::from(pct) / 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// The kind of resource a time slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// A workshop session with a capacity of attendees.
    Workshop,

    /// A rentable space.
    Space,
}

impl SlotKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Workshop => "workshop",
            SlotKind::Space => "space",
        }
    }
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The role an acting caller holds.
///
/// Authentication is out of scope; callers arrive with an identity and a
/// role, and admin-only operations check the role before mutating anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// A regular user booking for themselves.
    User,

    /// An administrator managing the catalog and slots.
    Admin,
}

impl ActorRole {
    /// Returns true for the admin role.
    pub fn is_admin(&self) -> bool {
        matches!(self, ActorRole::Admin)
    }
}

/// A half-open time window `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive start of the window.
    pub from: DateTime<Utc>,

    /// Exclusive end of the window.
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Creates a new range.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Returns true if the instant falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }
}
