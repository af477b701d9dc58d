use std::collections::BTreeSet;

use derive_more::{Display, From, FromStr};

use crate::{Error, Result};

/// The numeric identity of whoever sends requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, FromStr)]
pub struct RequesterId(u64);

impl RequesterId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// The requesters that are allowed to generate timesheets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessList {
    users: BTreeSet<RequesterId>,
}

impl AccessList {
    #[must_use]
    pub fn contains(&self, requester: RequesterId) -> bool {
        self.users.contains(&requester)
    }

    pub fn authorize(&self, requester: RequesterId) -> Result<()> {
        if self.contains(requester) {
            Ok(())
        } else {
            Err(Error::Unauthorized(requester))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = RequesterId> + '_ {
        self.users.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl FromIterator<RequesterId> for AccessList {
    fn from_iter<I: IntoIterator<Item = RequesterId>>(iter: I) -> Self {
        Self {
            users: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<u64> for AccessList {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        iter.into_iter().map(RequesterId).collect()
    }
}

/// Parses a comma separated list like `1, 22,333`.
impl std::str::FromStr for AccessList {
    type Err = std::num::ParseIntError;

    fn from_str(input: &str) -> core::result::Result<Self, Self::Err> {
        input
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::parse::<RequesterId>)
            .collect()
    }
}
