//! Lazy result stream over a fanned-out query set.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::error::CollectionResult;
use crate::codec::{unpack_entity, Payload};
use crate::store::{EntityStore, EntityStream, Query};

/// Iterator over the payloads matched by a collection query.
///
/// Native queries run one after another: the next one is only sent to the
/// store once the previous stream is exhausted. Results are concatenated in
/// query order and truncated at the limit. The first error ends the stream.
pub struct QueryCursor {
    store: Arc<dyn EntityStore>,
    pending: VecDeque<Query>,
    current: Option<EntityStream>,
    limit: Option<usize>,
    yielded: usize,
}

impl QueryCursor {
    pub(crate) fn new(store: Arc<dyn EntityStore>, queries: Vec<Query>, limit: Option<usize>) -> Self {
        Self {
            store,
            pending: queries.into(),
            current: None,
            limit,
            yielded: 0,
        }
    }

    /// Native queries not sent to the store yet.
    pub fn pending_queries(&self) -> usize {
        self.pending.len()
    }

    fn remaining(&self) -> Option<usize> {
        self.limit.map(|limit| limit.saturating_sub(self.yielded))
    }

    fn finish(&mut self) {
        self.pending.clear();
        self.current = None;
    }
}

impl Iterator for QueryCursor {
    type Item = CollectionResult<Payload>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == Some(0) {
            self.finish();
            return None;
        }

        loop {
            if let Some(stream) = self.current.as_mut() {
                match stream.next() {
                    Some(Ok(entity)) => {
                        self.yielded += 1;
                        return Some(Ok(unpack_entity(entity)));
                    }
                    Some(Err(e)) => {
                        self.finish();
                        return Some(Err(e.into()));
                    }
                    None => self.current = None,
                }
            }

            let query = self.pending.pop_front()?;
            debug!(
                target: "entitydoc::collection",
                query = %query,
                remaining = ?self.remaining(),
                "running native query"
            );
            match self.store.fetch(&query, self.remaining()) {
                Ok(stream) => self.current = Some(stream),
                Err(e) => {
                    self.finish();
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

impl std::fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCursor")
            .field("pending", &self.pending.len())
            .field("limit", &self.limit)
            .field("yielded", &self.yielded)
            .finish()
    }
}
