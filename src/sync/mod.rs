//! Client-side mirrors of remote tables.
//!
//! A [`Collection`] keeps one table's rows in memory, applies CRUD through a
//! [`RemoteStore`], and refetches whenever the store reports a change from
//! any client. Entity types plug in through [`Entity`], which owns the
//! row mapping for its table.

mod collection;
pub mod projects;
pub mod row;
pub mod tasks;

pub use collection::{Collection, SyncState};

use crate::error::SyncResult;
use crate::store::{RemoteStore, Row};
use crate::types::{Project, Task};
use std::sync::Arc;

/// A record type mirrored from one remote table.
pub trait Entity: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Fields supplied on create.
    type New: Send + Sync;
    /// Partial update.
    type Patch: Send + Sync;

    /// Remote table name.
    const TABLE: &'static str;
    /// Singular noun for messages.
    const NOUN: &'static str;

    fn id(&self) -> &str;

    /// Normalize a remote row into a typed record.
    fn from_row(row: &Row) -> SyncResult<Self>;

    /// Reject invalid create input before any remote call.
    fn validate_new(new: &Self::New) -> SyncResult<()>;

    /// Insert payload holding only the defined fields.
    fn insert_row(new: &Self::New) -> Row;

    /// Reject invalid patches before any local or remote change.
    fn validate_patch(patch: &Self::Patch) -> SyncResult<()>;

    /// Patch payload holding only the fields being changed.
    fn patch_row(patch: &Self::Patch) -> Row;

    /// Apply a patch to the local copy.
    fn apply_patch(&mut self, patch: &Self::Patch);
}

/// The projects and tasks collections of one client, sharing a store.
#[derive(Clone)]
pub struct Board {
    pub projects: Arc<Collection<Project>>,
    pub tasks: Arc<Collection<Task>>,
}

impl Board {
    /// Mount both collections: initial fetch plus change subscription.
    pub async fn mount(store: Arc<dyn RemoteStore>) -> Self {
        let (projects, tasks) = tokio::join!(
            Collection::<Project>::mount(Arc::clone(&store)),
            Collection::<Task>::mount(store),
        );
        Self { projects, tasks }
    }

    /// Tear down both change subscriptions.
    pub async fn unmount(&self) {
        tokio::join!(self.projects.unmount(), self.tasks.unmount());
    }
}
