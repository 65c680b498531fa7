// Frame asset lifecycle - one live frame per road, every allocation released exactly once
use crate::domain::road::RoadId;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The consumer-visible frame for a road. `bytes` is the renderable payload.
#[derive(Debug, Clone)]
pub struct FrameAsset {
    pub handle: FrameHandle,
    pub road: RoadId,
    pub bytes: Bytes,
    pub received_at: DateTime<Utc>,
}

/// Invoked once per allocation when its frame leaves the live map.
pub trait FrameReleaser: Send + Sync {
    fn release(&self, asset: &FrameAsset);
}

/// Default releaser: drops the buffer and keeps running totals for diagnostics.
#[derive(Debug, Default)]
pub struct TracingReleaser {
    frames: AtomicU64,
    bytes: AtomicU64,
}

impl TracingReleaser {
    pub fn released_frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn released_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl FrameReleaser for TracingReleaser {
    fn release(&self, asset: &FrameAsset) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(asset.bytes.len() as u64, Ordering::Relaxed);
        tracing::trace!(
            road = %asset.road,
            handle = asset.handle.id(),
            bytes = asset.bytes.len(),
            "frame released"
        );
    }
}

pub struct FrameAssetLifecycle {
    slots: HashMap<RoadId, FrameAsset>,
    outstanding: HashSet<FrameHandle>,
    next_handle: u64,
    releaser: Arc<dyn FrameReleaser>,
}

impl FrameAssetLifecycle {
    pub fn new(releaser: Arc<dyn FrameReleaser>) -> Self {
        Self {
            slots: HashMap::new(),
            outstanding: HashSet::new(),
            next_handle: 1,
            releaser,
        }
    }

    /// Install a new frame for `road`. The previous frame is released only after
    /// the new one occupies the slot.
    pub fn publish(&mut self, road: RoadId, bytes: Bytes, received_at: DateTime<Utc>) -> FrameAsset {
        let handle = FrameHandle(self.next_handle);
        self.next_handle += 1;

        let asset = FrameAsset {
            handle,
            road: road.clone(),
            bytes,
            received_at,
        };
        self.outstanding.insert(handle);

        if let Some(previous) = self.slots.insert(road, asset.clone()) {
            self.release(previous);
        }
        asset
    }

    /// Release and unmap the road's live frame. Returns whether one was live.
    pub fn evict(&mut self, road: &RoadId) -> bool {
        match self.slots.remove(road) {
            Some(asset) => {
                self.release(asset);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        let roads: Vec<RoadId> = self.slots.keys().cloned().collect();
        for road in roads {
            self.evict(&road);
        }
    }

    pub fn current(&self, road: &RoadId) -> Option<&FrameAsset> {
        self.slots.get(road)
    }

    pub fn live(&self) -> impl Iterator<Item = &FrameAsset> {
        self.slots.values()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len()
    }

    /// Allocations not yet released. Always equals `live_count`.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn release(&mut self, asset: FrameAsset) {
        let was_outstanding = self.outstanding.remove(&asset.handle);
        debug_assert!(was_outstanding, "frame {:?} released twice", asset.handle);
        if !was_outstanding {
            tracing::error!(road = %asset.road, handle = asset.handle.id(), "ignoring double release of frame");
            return;
        }
        self.releaser.release(&asset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::RecordingReleaser;

    fn lifecycle() -> (FrameAssetLifecycle, Arc<RecordingReleaser>) {
        let releaser = Arc::new(RecordingReleaser::default());
        (FrameAssetLifecycle::new(releaser.clone()), releaser)
    }

    #[test]
    fn test_publish_releases_predecessor_once() {
        let (mut frames, releaser) = lifecycle();
        let road = RoadId::from("A");

        let first = frames.publish(road.clone(), Bytes::from_static(b"one"), Utc::now());
        assert!(releaser.released().is_empty());

        let second = frames.publish(road.clone(), Bytes::from_static(b"two"), Utc::now());
        assert_eq!(releaser.released(), vec![first.handle]);
        assert_eq!(frames.current(&road).map(|a| a.handle), Some(second.handle));
        assert_eq!(frames.live_count(), 1);
        assert_eq!(frames.outstanding(), 1);

        let third = frames.publish(road.clone(), Bytes::from_static(b"three"), Utc::now());
        assert_eq!(releaser.released(), vec![first.handle, second.handle]);
        assert_ne!(third.handle, second.handle);
    }

    #[test]
    fn test_roads_are_independent() {
        let (mut frames, releaser) = lifecycle();
        frames.publish(RoadId::from("A"), Bytes::from_static(b"a"), Utc::now());
        frames.publish(RoadId::from("B"), Bytes::from_static(b"b"), Utc::now());

        assert_eq!(frames.live_count(), 2);
        assert!(releaser.released().is_empty());
    }

    #[test]
    fn test_evict_releases_and_is_idempotent() {
        let (mut frames, releaser) = lifecycle();
        let road = RoadId::from("B");
        let asset = frames.publish(road.clone(), Bytes::from_static(b"frame"), Utc::now());

        assert!(frames.evict(&road));
        assert!(!frames.evict(&road));
        assert_eq!(releaser.released(), vec![asset.handle]);
        assert!(frames.current(&road).is_none());
        assert_eq!(frames.outstanding(), 0);
    }

    #[test]
    fn test_clear_releases_everything() {
        let (mut frames, releaser) = lifecycle();
        for name in ["A", "B", "C"] {
            frames.publish(RoadId::from(name), Bytes::from_static(b"x"), Utc::now());
        }

        frames.clear();

        assert_eq!(releaser.released().len(), 3);
        assert_eq!(frames.live_count(), 0);
        assert_eq!(frames.outstanding(), 0);
    }

    #[test]
    fn test_tracing_releaser_counts() {
        let releaser = Arc::new(TracingReleaser::default());
        let mut frames = FrameAssetLifecycle::new(releaser.clone());
        let road = RoadId::from("A");
        frames.publish(road.clone(), Bytes::from_static(b"1234"), Utc::now());
        frames.publish(road, Bytes::from_static(b"56"), Utc::now());

        assert_eq!(releaser.released_frames(), 1);
        assert_eq!(releaser.released_bytes(), 4);
    }
}
