//! RAII guard for epoch-protected critical sections.

use std::marker::PhantomData;

use crate::reclaim::{Participant, Reclaimer};

/// A live critical section.
///
/// While any guard on a thread exists, objects retired at the pinned
/// epoch or later stay alive for that thread. Dropping the outermost
/// guard unpins the thread and gives the reclaimer an advance
/// opportunity.
///
/// Guards are tied to the creating thread and must not be sent across
/// threads (the raw participant pointer enforces `!Send`).
pub struct Guard<'a> {
    reclaimer: &'a Reclaimer,
    participant: *mut Participant,
    _not_send: PhantomData<*mut ()>,
}

impl<'a> Guard<'a> {
    pub(crate) fn new(reclaimer: &'a Reclaimer, participant: *mut Participant) -> Guard<'a> {
        Guard {
            reclaimer,
            participant,
            _not_send: PhantomData,
        }
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.reclaimer.unpin(self.participant);
    }
}
