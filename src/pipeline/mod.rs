//! Pipeline stages for code block formatting.
//!
//! Each submodule implements exactly one transformation step, applied to one
//! document at a time in line order.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ segment ──▶ classify ──▶ indent ──▶ render
//! (text)    (runs)      (label)      (spaces)   (fences)
//! ```
//!
//! 1. [`input`]    — normalise converter output into a [`input::Document`]
//! 2. [`segment`]  — split lines into prose, code and pre-fenced segments
//! 3. [`classify`] — score each code segment against the supported languages
//! 4. [`indent`]   — preserve or normalise indentation of labeled code
//! 5. [`render`]   — wrap code in fences and assemble the output text
//!
//! [`crate::batch`] drives the stages and owns concurrency; nothing in here
//! spawns tasks or holds shared state.

pub mod classify;
pub mod indent;
pub mod input;
pub mod render;
pub mod segment;
