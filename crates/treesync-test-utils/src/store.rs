//! A scriptable in-memory store fake.
//!
//! [`RecordingStore`] records every primitive call in order, tracks
//! registrations idempotently, and can be scripted to fail a given
//! primitive — optionally for one resource only, and optionally after
//! applying a prefix of a batch slice.

use std::cell::RefCell;
use std::collections::BTreeSet;

use treesync_engine::{FetchOptions, Store, StoreError, StorePrimitive, StoreResult};
use treesync_model::{Direction, Resource};

/// One recorded primitive invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    IsTracked(String),
    Register(String),
    Unregister(String),
    DeleteLocal(String),
    DeleteRemote(Vec<String>),
    Publish(Vec<String>, String),
    Fetch(Vec<String>, FetchOptions),
    MarkMerged(Vec<String>),
    ConvertDirection(String, Direction),
}

struct Failure {
    primitive: StorePrimitive,
    path: Option<String>,
    error: StoreError,
}

/// In-memory [`Store`] implementation for tests.
#[derive(Default)]
pub struct RecordingStore {
    calls: RefCell<Vec<StoreCall>>,
    tracked: RefCell<BTreeSet<String>>,
    failures: Vec<Failure>,
}

impl RecordingStore {
    /// An empty store tracking nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark resources as already tracked.
    pub fn with_tracked<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut tracked = self.tracked.borrow_mut();
            for path in paths {
                tracked.insert(path.into());
            }
        }
        self
    }

    /// Script a failure for every call to one primitive.
    pub fn fail_when(mut self, primitive: StorePrimitive, error: StoreError) -> Self {
        self.failures.push(Failure {
            primitive,
            path: None,
            error,
        });
        self
    }

    /// Script a failure for one primitive on one resource.
    pub fn fail_when_path(
        mut self,
        primitive: StorePrimitive,
        path: impl Into<String>,
        error: StoreError,
    ) -> Self {
        self.failures.push(Failure {
            primitive,
            path: Some(path.into()),
            error,
        });
        self
    }

    /// All calls recorded so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.borrow().clone()
    }

    /// Whether the store currently tracks a path.
    pub fn tracks(&self, path: &str) -> bool {
        self.tracked.borrow().contains(path)
    }

    fn record(&self, call: StoreCall) {
        self.calls.borrow_mut().push(call);
    }

    fn failure_for(&self, primitive: StorePrimitive, paths: &[&str]) -> StoreResult<()> {
        for failure in &self.failures {
            if failure.primitive != primitive {
                continue;
            }
            match &failure.path {
                Some(path) if !paths.contains(&path.as_str()) => continue,
                _ => return Err(failure.error.clone()),
            }
        }
        Ok(())
    }
}

fn paths_of(resources: &[Resource]) -> Vec<String> {
    resources
        .iter()
        .map(|resource| resource.path.to_string())
        .collect()
}

impl Store for RecordingStore {
    fn is_tracked(&self, resource: &Resource) -> StoreResult<bool> {
        self.record(StoreCall::IsTracked(resource.path.to_string()));
        self.failure_for(StorePrimitive::IsTracked, &[resource.path.as_str()])?;
        Ok(self.tracked.borrow().contains(resource.path.as_str()))
    }

    fn register(&mut self, resource: &Resource) -> StoreResult<()> {
        self.record(StoreCall::Register(resource.path.to_string()));
        self.failure_for(StorePrimitive::Register, &[resource.path.as_str()])?;
        // Idempotent by contract.
        self.tracked.borrow_mut().insert(resource.path.to_string());
        Ok(())
    }

    fn unregister(&mut self, resource: &Resource) -> StoreResult<()> {
        self.record(StoreCall::Unregister(resource.path.to_string()));
        self.failure_for(StorePrimitive::Unregister, &[resource.path.as_str()])?;
        self.tracked.borrow_mut().remove(resource.path.as_str());
        Ok(())
    }

    fn delete_local(&mut self, resource: &Resource) -> StoreResult<()> {
        self.record(StoreCall::DeleteLocal(resource.path.to_string()));
        self.failure_for(StorePrimitive::DeleteLocal, &[resource.path.as_str()])
    }

    fn delete_remote(&mut self, resources: &[Resource]) -> StoreResult<()> {
        self.record(StoreCall::DeleteRemote(paths_of(resources)));
        let paths: Vec<&str> = resources.iter().map(|r| r.path.as_str()).collect();
        self.failure_for(StorePrimitive::DeleteRemote, &paths)
    }

    fn publish(&mut self, resources: &[Resource], message: &str) -> StoreResult<()> {
        self.record(StoreCall::Publish(paths_of(resources), message.to_string()));
        let paths: Vec<&str> = resources.iter().map(|r| r.path.as_str()).collect();
        self.failure_for(StorePrimitive::Publish, &paths)
    }

    fn fetch(&mut self, resources: &[Resource], options: FetchOptions) -> StoreResult<()> {
        self.record(StoreCall::Fetch(paths_of(resources), options));
        let paths: Vec<&str> = resources.iter().map(|r| r.path.as_str()).collect();
        self.failure_for(StorePrimitive::Fetch, &paths)
    }

    fn mark_merged(&mut self, resources: &[Resource]) -> StoreResult<()> {
        self.record(StoreCall::MarkMerged(paths_of(resources)));
        let paths: Vec<&str> = resources.iter().map(|r| r.path.as_str()).collect();
        self.failure_for(StorePrimitive::MarkMerged, &paths)
    }

    fn convert_direction(&mut self, resource: &Resource, to: Direction) -> StoreResult<()> {
        self.record(StoreCall::ConvertDirection(resource.path.to_string(), to));
        self.failure_for(StorePrimitive::ConvertDirection, &[resource.path.as_str()])
    }
}
