//! Markcopy Agent — per-frame content agent: selection unblock, content
//! locator, clipboard write, readiness answers.
//!
//! The page itself is reached only through the [`Frame`] trait, the
//! clipboard through [`Clipboard`] and article extraction through
//! [`ReadabilityExtractor`], so the whole pipeline runs against in-memory
//! pages in tests and in the CLI.

pub mod agent;
pub mod clipboard;
pub mod frame;
pub mod locator;
pub mod readability;
pub mod unblock;

pub use agent::{ContentAgent, Conversion, AGENT_MARKER};
pub use clipboard::{copy_to_clipboard, Clipboard, ClipboardPath, MemoryClipboard};
pub use frame::{Frame, Selection, StaticFrame, Toast};
pub use locator::{CapturedFragment, ContentLocator, FragmentOrigin, LocatorConfig};
pub use readability::{Article, ReadabilityArticle, ReadabilityExtractor};
pub use unblock::{enable_selection, ListenerFilter};
