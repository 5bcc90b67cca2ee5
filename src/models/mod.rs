pub mod chat;
pub mod retrieval;
