//! Query queue shared by the worker pool
//!
//! Workers pop Queries one at a time, so each Query is processed by exactly
//! one worker and every worker ends up with a disjoint subset. Queries come
//! out in the order they were queued.

use crate::model::Query;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// FIFO of Queries waiting to be crawled
#[derive(Debug, Clone, Default)]
pub struct QueryQueue {
    inner: Arc<Mutex<VecDeque<Query>>>,
}

impl QueryQueue {
    pub fn new(queries: Vec<Query>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(queries.into())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Query>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes the next Query, if any remain
    pub fn pop(&self) -> Option<Query> {
        self.lock().pop_front()
    }

    /// Number of Queries not yet taken
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
