pub const APP_NAME: &str = "Huddle";

// Limits
pub const MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_ROOM_NAME_LENGTH: usize = 100;
pub const MAX_MENTIONS: usize = 100;
pub const MAX_DEVICE_TOKEN_LENGTH: usize = 4096;

pub const MESSAGE_PAGE_SIZE: i64 = 50;
pub const MAX_MESSAGE_PAGE_SIZE: i64 = 100;

// Rooms
pub const DEFAULT_ROOM_NAME: &str = "Chat room";
pub const DIRECT_ROOM_TITLE: &str = "Direct chat";
pub const REACTION_SLOTS: usize = 8;

/// Room id clients subscribe to for the aggregate notifications feed.
/// It is not a chat room and never produces presence events.
pub const NOTIFICATION_FEED_ROOM: &str = "notification";

// Realtime
pub const STOMP_ENDPOINT: &str = "/stomp/chat";
pub const APP_DESTINATION_PREFIX: &str = "/pub";
pub const ROOM_TOPIC_PREFIX: &str = "room.";

// Push previews
pub const IMAGE_PREVIEW: &str = "sent a photo.";
pub const FILE_PREVIEW: &str = "sent a file.";
