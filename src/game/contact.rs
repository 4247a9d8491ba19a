//! Contact routing from the simulation to board owners
//!
//! The observer never touches a board. It only queues notices while the
//! engine is iterating; the board drains the queue once `step` has returned.

use crate::physics::{BodyHandle, Contact, ContactListener, OwnerTag};

/// "A body owned by `owner` touched `other`"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactNotice {
    pub owner: OwnerTag,
    pub body: BodyHandle,
    pub other: BodyHandle,
}

/// Deferred-event buffer fed by begin-contact callbacks
#[derive(Debug, Clone, Default)]
pub struct ContactObserver {
    notices: Vec<ContactNotice>,
}

impl ContactObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    /// Take every queued notice, oldest first
    pub fn drain(&mut self) -> Vec<ContactNotice> {
        std::mem::take(&mut self.notices)
    }
}

impl ContactListener for ContactObserver {
    fn begin_contact(&mut self, contact: &Contact) {
        // One notice per tagged side; a contact between two tagged bodies
        // produces two.
        if let Some(owner) = contact.owner_a {
            self.notices.push(ContactNotice {
                owner,
                body: contact.body_a(),
                other: contact.body_b(),
            });
        }
        if let Some(owner) = contact.owner_b {
            self.notices.push(ContactNotice {
                owner,
                body: contact.body_b(),
                other: contact.body_a(),
            });
        }
    }
}
