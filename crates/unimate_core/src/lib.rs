pub mod domain;
pub mod ports;

pub use domain::{
    ChatMessage, Conversation, ConversationContext, ConversationPage, MessageRole, Preferences,
    Role, User, UserCredentials,
};
pub use ports::{
    AssistantError, AssistantReply, AssistantRequest, AssistantService, DatabaseService,
    HistoryEntry, PortError, PortResult, RateCounterStore, RateDecision,
};
