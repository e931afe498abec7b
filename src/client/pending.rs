use std::collections::HashMap;

use tokio::sync::oneshot;

use super::delegate::OneOffQueryResult;
use crate::error::{ClientError, ClientResult};

pub(crate) type MessageId = [u8; 16];

type Waiter = oneshot::Sender<ClientResult<OneOffQueryResult>>;

/// One-off queries awaiting a response, keyed by message id.
///
/// Whoever removes an entry first completes it; later attempts find nothing
/// and do nothing.
#[derive(Default)]
pub(crate) struct PendingQueries {
    waiters: HashMap<MessageId, Waiter>,
}

impl PendingQueries {
    pub(crate) fn insert(&mut self, id: MessageId, waiter: Waiter) {
        self.waiters.insert(id, waiter);
    }

    pub(crate) fn contains(&self, id: &MessageId) -> bool {
        self.waiters.contains_key(id)
    }

    /// Returns false if the entry was already completed.
    pub(crate) fn complete(&mut self, id: &MessageId, result: ClientResult<OneOffQueryResult>) -> bool {
        match self.waiters.remove(id) {
            Some(waiter) => {
                // The caller may have stopped waiting; that is fine.
                let _ = waiter.send(result);
                true
            }
            None => false,
        }
    }

    pub(crate) fn fail_all(&mut self) -> usize {
        let count = self.waiters.len();
        for (_, waiter) in self.waiters.drain() {
            let _ = waiter.send(Err(ClientError::Disconnected));
        }
        count
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}
