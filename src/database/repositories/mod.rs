pub mod room_group;

pub use room_group::{GroupStats, RoomGroupRepository, StoredRoomGroup};
