//! Concierge core library: a conversational decision loop for customer support, with
//! knowledge retrieval, LLM backends and session memory, used by the CLI.

pub mod agent;
pub mod app;
pub mod config;
pub mod init;
pub mod knowledge;
pub mod llm;
pub mod session;
