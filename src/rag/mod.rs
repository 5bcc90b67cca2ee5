pub mod augment;
pub mod rag;
