use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::intake::StreamId;

use super::stream::{ActiveSlot, ContainerSize, Stream};

/// Owns every stream keyed by id. Unknown ids are routine (a message can
/// race a teardown), so lookups return `Option` and mutations report
/// whether anything was touched.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: BTreeMap<StreamId, Stream>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: an existing stream is returned as is, slots untouched.
    /// Returns whether a new stream was created.
    pub fn create(&mut self, id: StreamId, container: ContainerSize) -> bool {
        if self.streams.contains_key(&id) {
            debug!(stream_id = %id, "stream_already_registered");
            return false;
        }
        info!(
            stream_id = %id,
            width = container.width,
            height = container.height,
            "stream_created"
        );
        self.streams.insert(id.clone(), Stream::new(id, container));
        true
    }

    /// Removes the stream and hands back whatever was still in flight.
    /// Unknown or already-destroyed ids yield nothing.
    pub fn destroy(&mut self, id: &StreamId) -> Vec<ActiveSlot> {
        match self.streams.remove(id) {
            Some(mut stream) => {
                let retired = stream.drain_all();
                info!(stream_id = %id, retired = retired.len(), "stream_destroyed");
                retired
            }
            None => Vec::new(),
        }
    }

    pub fn set_enabled(&mut self, id: &StreamId, enabled: bool) -> bool {
        match self.streams.get_mut(id) {
            Some(stream) => {
                if stream.enabled() != enabled {
                    info!(stream_id = %id, enabled, "stream_toggled");
                }
                stream.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn resize(&mut self, id: &StreamId, container: ContainerSize) -> bool {
        match self.streams.get_mut(id) {
            Some(stream) => {
                stream.set_container(container);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &StreamId) -> Option<&Stream> {
        self.streams.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(id)
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.streams.contains_key(id)
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    pub(crate) fn streams_mut(&mut self) -> impl Iterator<Item = &mut Stream> {
        self.streams.values_mut()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn total_active(&self) -> usize {
        self.streams.values().map(Stream::active_count).sum()
    }

    /// Tears down every stream, in id order.
    pub fn clear(&mut self) -> Vec<(StreamId, ActiveSlot)> {
        let mut retired = Vec::new();
        for (id, mut stream) in std::mem::take(&mut self.streams) {
            retired.extend(stream.drain_all().into_iter().map(|active| (id.clone(), active)));
        }
        retired
    }
}
