//! Pipeline stages for slide-deck conversion.
//!
//! Each submodule implements exactly one step, so each can be tested with
//! fakes in place of the external tools around it.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ office ──▶ render ──▶ collect ──▶ upload
//! (job)    (→ PDF)    (→ PNGs)   (order)     (durable URLs)
//! ```
//!
//! 1. [`input`]   — validate the source and presentation id into a job
//! 2. [`office`]  — office deck to PDF; skipped for PDF input
//! 3. [`render`]  — the raster strategy chain, first success wins; the
//!    concrete strategies live in [`strategies`]
//! 4. [`collect`] — natural sort and renumbering to `slide-NNN.png`
//! 5. [`upload`]  — per-slide promotion with local fallback

pub mod collect;
pub mod input;
pub mod office;
pub mod render;
pub mod strategies;
pub mod upload;
