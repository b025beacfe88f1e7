/// User intents fed into the controller loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    CreateRoom {
        room_id: Option<String>,
        display_name: String,
    },
    JoinRoom {
        room_id: String,
        display_name: String,
    },
    SendChat {
        body: String,
        file_ref: Option<String>,
    },
    SetTyping(bool),
    Leave,
}
