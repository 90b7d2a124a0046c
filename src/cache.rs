//! Lock-free lookup of root producers.
//!
//! Readers load an immutable snapshot; a miss builds the producer outside any
//! lock and publishes a new snapshot with read-copy-update. When two threads
//! race on the same key, the first published producer wins and the other is
//! discarded, so every caller ends up with the same producer.

use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult, LockSite};
use crate::internal::FastMap;
use crate::key::Key;
use crate::producer::InstanceProducer;

type ProducerMap = FastMap<Key, Option<Arc<InstanceProducer>>>;
type CollectionMap = FastMap<Key, Arc<[Arc<InstanceProducer>]>>;

pub(crate) struct ResolutionCache {
    producers: ArcSwap<ProducerMap>,
    collections: ArcSwap<CollectionMap>,
    lock_site: OnceCell<LockSite>,
}

impl ResolutionCache {
    pub(crate) fn new() -> Self {
        Self {
            producers: ArcSwap::from_pointee(ProducerMap::default()),
            collections: ArcSwap::from_pointee(CollectionMap::default()),
            lock_site: OnceCell::new(),
        }
    }

    /// Locks the cache; returns false if it was already locked.
    pub(crate) fn lock(&self, site: LockSite) -> bool {
        self.lock_site.set(site).is_ok()
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.lock_site.get().is_some()
    }

    pub(crate) fn lock_site(&self) -> Option<&LockSite> {
        self.lock_site.get()
    }

    /// Fails with [`DiError::ContainerLocked`] once the container is locked.
    pub(crate) fn ensure_open(&self, attempted: impl FnOnce() -> String) -> DiResult<()> {
        match self.lock_site.get() {
            None => Ok(()),
            Some(site) => Err(DiError::ContainerLocked {
                attempted: attempted(),
                lock_site: site.clone(),
            }),
        }
    }

    /// The producer for `key`, building and publishing it on a miss.
    ///
    /// A build returning `Ok(None)` is cached as a known absence. Build errors
    /// are not cached.
    pub(crate) fn get_or_build<F>(&self, key: &Key, build: F) -> DiResult<Option<Arc<InstanceProducer>>>
    where
        F: FnOnce() -> DiResult<Option<Arc<InstanceProducer>>>,
    {
        if let Some(found) = self.producers.load().get(key) {
            return Ok(found.clone());
        }

        let built = build()?;
        let mut winner = built.clone();
        self.producers.rcu(|current| {
            if let Some(existing) = current.get(key) {
                winner = existing.clone();
                return Arc::clone(current);
            }
            winner = built.clone();
            let mut next = ProducerMap::clone(current);
            next.insert(*key, built.clone());
            Arc::new(next)
        });
        Ok(winner)
    }

    /// The producers of the collection registered under `key`.
    pub(crate) fn get_or_build_collection<F>(&self, key: &Key, build: F) -> DiResult<Arc<[Arc<InstanceProducer>]>>
    where
        F: FnOnce() -> DiResult<Vec<Arc<InstanceProducer>>>,
    {
        if let Some(found) = self.collections.load().get(key) {
            return Ok(found.clone());
        }

        let built: Arc<[Arc<InstanceProducer>]> = build()?.into();
        let mut winner = built.clone();
        self.collections.rcu(|current| {
            if let Some(existing) = current.get(key) {
                winner = existing.clone();
                return Arc::clone(current);
            }
            winner = built.clone();
            let mut next = CollectionMap::clone(current);
            next.insert(*key, built.clone());
            Arc::new(next)
        });
        Ok(winner)
    }

    /// Number of cached root entries, absences included.
    pub(crate) fn len(&self) -> usize {
        self.producers.load().len()
    }
}
