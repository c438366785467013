//! # AskDocs
//!
//! A document question-answering service: upload files, have them
//! standardized into structured JSON by an LLM, and chat against the
//! collection with retrieval-grounded, citation-bearing answers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upload  │──▶│   Extract     │──▶│  Store    │
//! │ multipart│   │ +OCR+LLM std │   │ mem/SQLite│
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │
//!                    ┌───────────────────┤
//!                    ▼                   ▼
//!               ┌──────────┐       ┌──────────┐
//!               │   CLI    │       │   HTTP   │
//!               │  (askd)  │       │  (JSON)  │
//!               └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! askd init                       # create database
//! askd upload report.pdf          # extract, standardize, store
//! askd search "q3 revenue"        # keyword retrieval
//! askd serve                      # start the JSON API server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF/DOCX/PPTX/TXT text extraction |
//! | [`ocr`] | OCR fallback for image-only PDFs |
//! | [`standardize`] | LLM standardization into structured documents |
//! | [`retrieve`] | Keyword-overlap retrieval |
//! | [`completion`] | Chat completion providers |
//! | [`ingest`] | Upload pipeline |
//! | [`store`] | Storage backends (in-memory, SQLite) |
//! | [`session`] | Signed session cookies and password hashing |
//! | [`settings`] | White-label branding settings |
//! | [`stats`] | Dashboard summary |
//! | [`server`] | JSON HTTP API server |

pub mod completion;
pub mod config;
pub mod db;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod ocr;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod settings;
pub mod standardize;
pub mod stats;
pub mod store;
