use thiserror::Error;

use crate::entitlement;
use crate::error::AppError;
use crate::model::{HouseholdSnapshot, FREE_TIER_LIMIT, LIMIT_REACHED, PREMIUM_REQUIRED};

/// Collections with an independent free-tier ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Inventory,
    Grocery,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Inventory => "inventory",
            Collection::Grocery => "grocery",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GateRejection {
    #[error("household has multiple members and no active premium")]
    PremiumRequired,
    #[error("free tier limit of {limit} reached for {collection}")]
    LimitReached {
        collection: &'static str,
        limit: i64,
    },
}

impl GateRejection {
    pub fn code(&self) -> &'static str {
        match self {
            GateRejection::PremiumRequired => PREMIUM_REQUIRED,
            GateRejection::LimitReached { .. } => LIMIT_REACHED,
        }
    }
}

impl From<GateRejection> for AppError {
    fn from(rejection: GateRejection) -> Self {
        let err = AppError::new(rejection.code(), rejection.to_string());
        match rejection {
            GateRejection::LimitReached { collection, limit } => err
                .with_context("collection", collection)
                .with_context("limit", limit.to_string()),
            GateRejection::PremiumRequired => err,
        }
    }
}

/// Write permission: sole-member households always write; multi-member
/// households need an active entitlement. Reads are never gated.
pub fn admit_write(snapshot: &HouseholdSnapshot) -> Result<(), GateRejection> {
    if snapshot.member_count <= 1 || entitlement::is_active(&snapshot.household) {
        Ok(())
    } else {
        Err(GateRejection::PremiumRequired)
    }
}

/// Write permission plus the per-collection item ceiling. The count is read
/// before the insert without a transaction, so concurrent admits near the
/// ceiling can overshoot by a small margin (soft limit).
pub fn admit_insert(
    snapshot: &HouseholdSnapshot,
    collection: Collection,
    current_count: i64,
) -> Result<(), GateRejection> {
    admit_write(snapshot)?;
    if entitlement::is_active(&snapshot.household) || current_count < FREE_TIER_LIMIT {
        Ok(())
    } else {
        Err(GateRejection::LimitReached {
            collection: collection.as_str(),
            limit: FREE_TIER_LIMIT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Household;
    use crate::time::now_ms;

    fn snapshot(members: i64, is_premium: bool, expires: Option<i64>) -> HouseholdSnapshot {
        HouseholdSnapshot {
            household: Household {
                id: "h1".into(),
                name: "Home".into(),
                is_premium,
                premium_expires_at: expires,
                created_at: 0,
                updated_at: 0,
            },
            member_count: members,
        }
    }

    #[test]
    fn sole_member_free_household_can_write() {
        assert_eq!(admit_write(&snapshot(1, false, None)), Ok(()));
        assert_eq!(admit_write(&snapshot(0, false, None)), Ok(()));
    }

    #[test]
    fn multi_member_free_household_is_read_only() {
        assert_eq!(
            admit_write(&snapshot(2, false, None)),
            Err(GateRejection::PremiumRequired)
        );
    }

    #[test]
    fn multi_member_premium_household_can_write() {
        assert_eq!(admit_write(&snapshot(4, true, None)), Ok(()));
    }

    #[test]
    fn expired_premium_counts_as_free() {
        let expired = Some(now_ms() - 1_000);
        assert_eq!(
            admit_write(&snapshot(2, true, expired)),
            Err(GateRejection::PremiumRequired)
        );
        assert!(admit_insert(&snapshot(1, true, expired), Collection::Inventory, FREE_TIER_LIMIT).is_err());
    }

    #[test]
    fn free_household_hits_the_ceiling() {
        let snap = snapshot(1, false, None);
        assert_eq!(
            admit_insert(&snap, Collection::Inventory, FREE_TIER_LIMIT - 1),
            Ok(())
        );
        assert_eq!(
            admit_insert(&snap, Collection::Inventory, FREE_TIER_LIMIT),
            Err(GateRejection::LimitReached {
                collection: "inventory",
                limit: FREE_TIER_LIMIT,
            })
        );
    }

    #[test]
    fn premium_household_has_no_ceiling() {
        let snap = snapshot(1, true, None);
        assert_eq!(
            admit_insert(&snap, Collection::Grocery, FREE_TIER_LIMIT * 10),
            Ok(())
        );
    }

    #[test]
    fn rejection_maps_to_wire_codes() {
        let err = AppError::from(GateRejection::PremiumRequired);
        assert_eq!(err.code(), PREMIUM_REQUIRED);
        let err = AppError::from(GateRejection::LimitReached {
            collection: "grocery",
            limit: FREE_TIER_LIMIT,
        });
        assert_eq!(err.code(), LIMIT_REACHED);
        assert_eq!(err.context().get("collection"), Some(&"grocery".to_string()));
    }
}
