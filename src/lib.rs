//! feedsum keeps per-feed JSON snapshots up to date and attaches a
//! generated summary to every new entry.
//!
//! ## Architecture overview
//!
//! ```text
//!              ┌────────────┐ fetch  ┌───────────┐ merge ┌──────────────┐
//!  sources ──► │ pipeline   │ ─────► │ source/   │ ────► │ merge        │
//!              │ (per src)  │ ◄───── │ store     │       └──────┬───────┘
//!              └─────┬──────┘  load  └───────────┘              │ new entries
//!                    │ save                                     ▼
//!                    │                              ┌───────────────────────┐
//!                    └───────────────────────────── │ summarize/orchestrator│
//!                                                   │  budget → retry →     │
//!                                                   │  scheduler → LLM      │
//!                                                   └───────────────────────┘
//! ```
//!
//! * **`source/`**: the `FeedSource` trait, record types, RSS implementation.
//! * **`store`**: the `SnapshotStore` trait and the JSON file store.
//! * **`merge`**: reconciles a stored snapshot with a fresh fetch.
//! * **`throttle/`**: token budget, request scheduler, retry policy.
//! * **`summarize/`**: the `Summarizer` trait, OpenAI client, orchestrator.
//! * **`pipeline`**: drives every source through a full update cycle.
//! * **`config`**: flags and environment variables.

pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod summarize;
pub mod throttle;
