pub mod analysis;
pub mod chunking;
pub mod document;
pub mod expansion;
pub mod gemini;
pub mod index;
pub mod rag;
pub mod ranking;
