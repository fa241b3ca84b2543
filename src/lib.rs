pub mod agent;
pub mod config;
pub mod doctor;
pub mod error;
pub mod extract;
pub mod http;
pub mod llm;
pub mod mcp;
pub mod output;
pub mod probe;
pub mod provider;
pub mod research;
pub mod runner;
pub mod session;
