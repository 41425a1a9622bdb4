//! Write-time access checks shared by every write entry point.

use crate::error::SyncError;
use crate::gate::{is_expired, Clock};
use crate::identity::Identity;
use cohort_storage::Cohort;

/// Everything a write needs to decide whether it may proceed.
pub struct WriteContext<'a> {
    pub cohort: &'a Cohort,
    pub identity: Option<&'a Identity>,
    pub clock: &'a dyn Clock,
}

impl<'a> WriteContext<'a> {
    pub fn new(cohort: &'a Cohort, identity: Option<&'a Identity>, clock: &'a dyn Clock) -> Self {
        Self {
            cohort,
            identity,
            clock,
        }
    }

    pub fn identity(&self) -> Result<&'a Identity, SyncError> {
        self.identity.ok_or(SyncError::Unauthenticated)
    }

    pub fn ensure_member(&self, identity: &Identity) -> Result<(), SyncError> {
        if self.cohort.has_member(&identity.id) {
            Ok(())
        } else {
            Err(SyncError::NotMember)
        }
    }

    /// Reads the clock at call time.
    pub fn ensure_active(&self) -> Result<(), SyncError> {
        if is_expired(self.cohort, self.clock.now()) {
            Err(SyncError::CohortExpired)
        } else {
            Ok(())
        }
    }

    /// Gate check to run immediately before the store write.
    pub fn gate(&self) -> impl Fn() -> Result<(), SyncError> + Send + Sync + 'a {
        let cohort = self.cohort;
        let clock = self.clock;
        move || {
            if is_expired(cohort, clock.now()) {
                Err(SyncError::CohortExpired)
            } else {
                Ok(())
            }
        }
    }
}

/// Trimmed text, or `Empty` when nothing is left.
pub fn normalize_text(text: &str) -> Result<String, SyncError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(SyncError::Empty)
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use cohort_storage::{CohortId, UserId};

    fn cohort() -> Cohort {
        let ends_at = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        Cohort {
            id: CohortId::generate(),
            name: "Reading".to_string(),
            goal: "Two books".to_string(),
            ends_at,
            creator_id: UserId::from("alice"),
            members: vec![UserId::from("alice")],
            created_at: ends_at - Duration::days(30),
        }
    }

    #[test]
    fn guest_is_unauthenticated() {
        let c = cohort();
        let clock = ManualClock::new(c.ends_at - Duration::days(1));
        let ctx = WriteContext::new(&c, None, &clock);
        assert_eq!(ctx.identity().unwrap_err(), SyncError::Unauthenticated);
    }

    #[test]
    fn membership_check() {
        let c = cohort();
        let clock = ManualClock::new(c.ends_at - Duration::days(1));
        let alice = Identity::new("alice", "Alice");
        let bob = Identity::new("bob", "Bob");
        let ctx = WriteContext::new(&c, Some(&bob), &clock);

        assert_eq!(ctx.ensure_member(&alice), Ok(()));
        assert_eq!(ctx.ensure_member(&bob), Err(SyncError::NotMember));
    }

    #[test]
    fn gate_reads_clock_when_called() {
        let c = cohort();
        let clock = ManualClock::new(c.ends_at - Duration::seconds(1));
        let ctx = WriteContext::new(&c, None, &clock);
        let gate = ctx.gate();

        assert_eq!(ctx.ensure_active(), Ok(()));
        assert_eq!(gate(), Ok(()));

        clock.advance(Duration::seconds(2));
        assert_eq!(ctx.ensure_active(), Err(SyncError::CohortExpired));
        assert_eq!(gate(), Err(SyncError::CohortExpired));
    }

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize_text("  hello \n"), Ok("hello".to_string()));
        assert_eq!(normalize_text(" \t\n "), Err(SyncError::Empty));
        assert_eq!(normalize_text(""), Err(SyncError::Empty));
    }
}
