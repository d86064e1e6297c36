use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use hotelier_core::catalog::RoomType;
use hotelier_core::repository::RoomTypeRepository;
use hotelier_core::CoreResult;

/// In-memory room type catalog
#[derive(Default)]
pub struct InMemoryRoomTypes {
    room_types: RwLock<HashMap<Uuid, RoomType>>,
}

impl InMemoryRoomTypes {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomTypeRepository for InMemoryRoomTypes {
    async fn upsert_room_type(&self, room_type: &RoomType) -> CoreResult<()> {
        self.room_types.write().await.insert(room_type.id, room_type.clone());
        Ok(())
    }

    async fn get_room_type(&self, id: Uuid) -> CoreResult<Option<RoomType>> {
        Ok(self.room_types.read().await.get(&id).cloned())
    }

    async fn list_room_types(&self) -> CoreResult<Vec<RoomType>> {
        let mut all: Vec<RoomType> = self.room_types.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
