//! # Catalog Chat
//!
//! A chat proxy that routes conversations to a local Ollama server or the
//! Gemini API and, on request, grounds them in a SQLite product catalog.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────┐    ┌────────────────┐
//!   POST /chat ──▶│   ChatService    │───▶│ ProviderRouter │──▶ Ollama | Gemini
//!                 └────────┬─────────┘    └────────────────┘
//!                          │ augmentation
//!                          ▼
//!              ┌──────────────────────┐   ┌────────────────┐   ┌──────────┐
//!              │   QueryInterpreter   │──▶│ ContextBuilder │──▶│  SQLite  │
//!              │ utterance→FilterSpec │   │ SQL → messages │   │ products │
//!              └──────────────────────┘   └────────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`error`] | Provider and interpreter errors |
//! | [`db`] | Connection pool and connection metadata |
//! | [`migrate`] | Schema creation |
//! | [`catalog`] | Product search, update, sampling |
//! | [`interpreter`] | Free text to [`models::FilterSpec`] via an LLM |
//! | [`context`] | FilterSpec to SQL to system messages |
//! | [`provider`] | Ollama and Gemini adapters and routing |
//! | [`chat`] | Request orchestration |
//! | [`server`] | HTTP API |
//! | [`seed`] | Random catalog data |
//! | [`stats`] | Catalog statistics |
//! | [`progress`] | Seeding progress on stderr |

pub mod catalog;
pub mod chat;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod interpreter;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod provider;
pub mod seed;
pub mod server;
pub mod stats;
