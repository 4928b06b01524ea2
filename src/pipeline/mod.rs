//! Pipeline stages for receipt extraction.
//!
//! ```text
//! input ──▶ llm ──▶ validate ──┬──▶ receipts (validated)
//! (path/URL) (VLM)   (strict)   └──▶ normalize ──▶ receipts (repaired)
//! ```
//!
//! 1. [`input`]     — resolve a path, URL or buffer to a [`input::Document`]
//! 2. [`encode`]    — base64 / data-URI helpers shared with the rasteriser
//! 3. [`llm`]       — the extraction capability; the only stage with network I/O
//! 4. [`validate`]  — strict schema and invariant check
//! 5. [`normalize`] — total repair of whatever validation rejected

pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod validate;
