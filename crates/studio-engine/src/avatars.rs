//! Downloaded avatar images, shared with the UI.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use studio_ipc::ParticipantId;

/// Avatar bytes by participant. A missing entry means the default avatar.
#[derive(Debug, Clone, Default)]
pub struct AvatarCache {
    images: Arc<RwLock<HashMap<ParticipantId, Bytes>>>,
}

impl AvatarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<Bytes> {
        self.images.read().get(id).cloned()
    }

    /// Store `image`, or forget the entry when `None`.
    pub fn set(&self, id: &ParticipantId, image: Option<Bytes>) {
        let mut images = self.images.write();
        match image {
            Some(image) => {
                images.insert(id.clone(), image);
            }
            None => {
                images.remove(id);
            }
        }
    }

    pub fn clear(&self) {
        self.images.write().clear();
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_images() {
        let cache = AvatarCache::new();
        let view = cache.clone();
        let id = ParticipantId::from("u1");

        cache.set(&id, Some(Bytes::from_static(b"img")));
        assert_eq!(view.get(&id), Some(Bytes::from_static(b"img")));

        cache.set(&id, None);
        assert!(view.is_empty());
    }
}
