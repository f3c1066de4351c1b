//! # IntelliForge
//!
//! Client-side workbench for a remote code-intelligence backend.
//!
//! A project's files are browsed and opened in an editor surface; selecting
//! code feeds three analysis panels (chat, explanation, usage/impact), each
//! with its own asynchronous request lifecycle against the backend's REST
//! API. All requests go through one keyed cache that deduplicates
//! idempotent reads and discards responses superseded by a newer request.
//!
//! ## Architecture
//!
//! ```text
//!  editor events          ┌───────────────┐  Focus(tab)  ┌───────────┐
//! ──────────────────────▶ │SelectionBridge│ ───────────▶ │ Workbench │
//!                         └───────┬───────┘              └─────┬─────┘
//!                                 │ SelectionSignal            │
//!                                 ▼                            ▼
//!  ┌────────────┐ project/file ┌───────────────────────────────────┐
//!  │ Navigation │ ───────────▶ │ ChatPanel  ExplainPanel  Analysis │
//!  └─────┬──────┘   changed    └─────────────────┬─────────────────┘
//!        │ query                                 │ mutate
//!        ▼                                       ▼
//!  ┌──────────────────────────────────────────────────────────┐
//!  │ RequestCache (keyed entries, generation counters)        │
//!  └────────────────────────────┬─────────────────────────────┘
//!                               ▼
//!                  AnalysisBackend (HttpClient)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`client`] | Typed REST boundary (`AnalysisBackend`, `HttpClient`) |
//! | [`error`] | Client and workbench error types |
//! | [`models`] | Wire and domain types |
//! | [`cache`] | Keyed async request cache |
//! | [`selection`] | Selection normalisation and tab requests |
//! | [`navigation`] | Active project/file and their queries |
//! | [`panel`] | Result-slot lifecycle shared by the panels |
//! | [`chat`] | Chat panel |
//! | [`explain`] | Explain panel |
//! | [`analysis`] | Usage/impact panel |
//! | [`workbench`] | Shell controller |
//! | [`render`] | Plain-text rendering |
//! | [`config`] | TOML configuration |
//! | [`logging`] | Tracing subscriber setup |
//! | [`repl`] | Interactive shell |

pub mod analysis;
pub mod cache;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod explain;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod panel;
pub mod render;
pub mod repl;
pub mod selection;
pub mod workbench;
