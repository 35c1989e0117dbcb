use chrono::{DateTime, Utc};

use giftlist_types::UserId;

use crate::error::{Result, StoreError};

/// Claim state of a list item. The claimant and the claim time only exist
/// together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimState {
    #[default]
    Unclaimed,
    Claimed { by: UserId, when: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimChange {
    Claim,
    Unclaim,
}

impl ClaimChange {
    /// Map a requested `claimed` flag onto a transition.
    pub fn from_claimed(claimed: bool) -> Self {
        if claimed {
            ClaimChange::Claim
        } else {
            ClaimChange::Unclaim
        }
    }
}

impl ClaimState {
    pub fn claimant(&self) -> Option<UserId> {
        match self {
            ClaimState::Claimed { by, .. } => Some(*by),
            ClaimState::Unclaimed => None,
        }
    }

    pub fn claimed_when(&self) -> Option<DateTime<Utc>> {
        match self {
            ClaimState::Claimed { when, .. } => Some(*when),
            ClaimState::Unclaimed => None,
        }
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimState::Claimed { .. })
    }

    /// Apply `change` on behalf of `actor`.
    ///
    /// Anyone, the list owner included, may claim an unclaimed item. Only the
    /// claimant may release it. Claiming a claimed item never transfers it.
    pub fn transition(self, change: ClaimChange, actor: UserId, now: DateTime<Utc>) -> Result<Self> {
        match (self, change) {
            (ClaimState::Unclaimed, ClaimChange::Claim) => Ok(ClaimState::Claimed {
                by: actor,
                when: now,
            }),
            (ClaimState::Claimed { .. }, ClaimChange::Claim) => Err(
                StoreError::FailedPrecondition("item is already claimed".into()),
            ),
            (ClaimState::Claimed { by, .. }, ClaimChange::Unclaim) if by == actor => {
                Ok(ClaimState::Unclaimed)
            }
            (ClaimState::Claimed { by, .. }, ClaimChange::Unclaim) => {
                Err(StoreError::PermissionDenied(format!(
                    "item was claimed by user {}, not user {}",
                    by, actor
                )))
            }
            (ClaimState::Unclaimed, ClaimChange::Unclaim) => Err(StoreError::FailedPrecondition(
                "item isn't claimed".into(),
            )),
        }
    }
}
