//! Pipeline stages for PDF-to-cover conversion.
//!
//! Each submodule implements exactly one step, so each can be tested on a
//! synthetic document without the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ metadata ──▶ locate ──▶ caption ──▶ build
//! (bytes)   (title/lang)  (Im XObj)  (VLM alt)   (PDF/UA-1)
//!                                      │
//!                                    encode (PNG data URL)
//! ```
//!
//! 1. [`input`]    : validate and parse the source bytes into a `SourceDocument`
//! 2. [`metadata`] : title, language and page count of the source
//! 3. [`locate`]   : first image XObject on page 1
//! 4. [`encode`]   : decode the XObject and wrap it as a base64 PNG data URL
//! 5. [`caption`]  : ask the vision model for alt text; the only stage with
//!    network I/O, and the only one allowed to fail silently
//! 6. [`build`]    : deep-copy the image into a new tagged document

pub mod build;
pub mod caption;
pub mod encode;
pub mod input;
pub mod locate;
pub mod metadata;
