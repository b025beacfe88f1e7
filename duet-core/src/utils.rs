pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

/// A room never holds more than this many connections.
pub const ROOM_CAPACITY: usize = 2;

/// Label of the data channel the initiator opens for chat.
pub const CHAT_CHANNEL_LABEL: &str = "chat";

pub const MAX_DISPLAY_NAME_LEN: usize = 64;
pub const MAX_ROOM_ID_LEN: usize = 64;
pub const GENERATED_ROOM_ID_LEN: usize = 7;
