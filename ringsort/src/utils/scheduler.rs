#![allow(unused)]

use crate::task::{Id, TaskState};
#[cfg(test)]
use dashmap::DashMap;
#[cfg(test)]
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Method {
    Resume,
    Suspend,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Resume { id: Id },
    Suspend { id: Id, state: TaskState },
    Exit { id: Id },
}

/// Records every scheduler decision so tests can assert on the *real*
/// rotation instead of a mock of it.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct Tracker {
    calls: Arc<DashMap<Method, Vec<Call>>>,
}

#[cfg(test)]
impl Tracker {
    pub(crate) fn new() -> Self {
        let map = DashMap::new();
        map.insert(Method::Resume, Vec::new());
        map.insert(Method::Suspend, Vec::new());
        map.insert(Method::Exit, Vec::new());

        Self {
            calls: Arc::new(map),
        }
    }

    pub(crate) fn record(&self, method: Method, call: Call) {
        self.calls
            .get_mut(&method)
            .expect("method not found")
            .push(call)
    }

    pub(crate) fn get_calls(&self, method: &Method) -> Vec<Call> {
        self.calls
            .get(method)
            .expect("method not found")
            .value()
            .clone()
    }

    pub(crate) fn num_calls(&self, method: &Method) -> usize {
        self.calls.get(method).map_or(0, |calls| calls.len())
    }

    /// Task ids in the order they were resumed.
    pub(crate) fn resume_order(&self) -> Vec<usize> {
        self.get_calls(&Method::Resume)
            .into_iter()
            .filter_map(|call| match call {
                Call::Resume { id } => Some(id.as_usize()),
                _ => None,
            })
            .collect()
    }
}
