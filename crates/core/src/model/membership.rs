//! Time-bounded group memberships

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Association of a player with a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Group display name
    pub group: String,
    /// Player display name
    pub member: String,
    /// Point after which the membership no longer counts
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn new(group: &str, member: &str, expiration: Option<DateTime<Utc>>) -> Self {
        Self {
            group: group.to_string(),
            member: member.to_string(),
            expiration,
        }
    }

    /// Expired memberships may still be stored until swept
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|at| at <= now)
    }
}

/// Drop memberships that have expired as of `now`
pub fn filter_expired(memberships: Vec<Membership>, now: DateTime<Utc>) -> Vec<Membership> {
    memberships
        .into_iter()
        .filter(|m| !m.is_expired(now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiration_boundary() {
        let now = Utc::now();
        assert!(!Membership::new("vip", "alice", None).is_expired(now));
        assert!(!Membership::new("vip", "alice", Some(now + Duration::seconds(1))).is_expired(now));
        assert!(Membership::new("vip", "alice", Some(now)).is_expired(now));
    }

    #[test]
    fn test_filter_expired_keeps_order() {
        let now = Utc::now();
        let memberships = vec![
            Membership::new("a", "bob", None),
            Membership::new("b", "bob", Some(now - Duration::hours(1))),
            Membership::new("c", "bob", Some(now + Duration::hours(1))),
        ];

        let live = filter_expired(memberships, now);
        let groups: Vec<&str> = live.iter().map(|m| m.group.as_str()).collect();
        assert_eq!(groups, vec!["a", "c"]);
    }
}
