//! I/O stages behind the page-range parser.
//!
//! ```text
//! input ──▶ encode ──▶ llm
//! (locator)  (base64)  (vision call)
//! ```
//!
//! 1. [`input`]  - resolve a page's image locator (data URI, URL, file)
//! 2. [`encode`] - downscale when needed and base64-wrap for the request body
//! 3. [`llm`]    - drive the vision call with retry, timeout and fallback;
//!    the only stage that talks to a model

pub mod encode;
pub mod input;
pub mod llm;
