//! # wut
//!
//! Describe unfamiliar files in one sentence using a language model.
//!
//! `wut` classifies each input file with `file --mime-type`, extracts a
//! representation the model can read (text, PDF text, a binary inspection
//! report, or base64 image data), trims it to fit the model's context
//! window, and asks an OpenAI-compatible chat endpoint for a one-sentence
//! description. With `--summary` it finishes with a cross-file summary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐   ┌──────────────┐
//! │  paths   │──▶│  extract  │──▶│  summarize  │──▶│     llm      │
//! │  (CLI)   │   │ file/pdf/ │   │  budgets +  │   │ /chat/       │
//! └──────────┘   │ otool/... │   │  prompts    │   │ completions  │
//!                └─────┬─────┘   └─────────────┘   └──────────────┘
//!                      ▼
//!                 ┌─────────┐
//!                 │ command │  (external utilities)
//!                 └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wut README.md Cargo.toml
//! wut --summary --context-length 32000 src/*.rs
//! wut --base-url https://api.openai.com/v1 --model gpt-4o-mini photo.png
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`command`] | External command runner seam |
//! | [`config`] | TOML/env/flag configuration |
//! | [`extract`] | Content classification and extraction |
//! | [`llm`] | Chat-completion client |
//! | [`progress`] | Progress reporting on stderr |
//! | [`run`] | Batch driver |
//! | [`summarize`] | Budgeted per-file and aggregate summaries |

pub mod command;
pub mod config;
pub mod extract;
pub mod llm;
pub mod progress;
pub mod run;
pub mod summarize;
