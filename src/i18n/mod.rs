//! Language catalog and session observability.
//!
//! # Architecture
//!
//! - `registry`: The static list of languages an app supports, used as the
//!   fan-out target for auto-registration
//! - `metrics`: Per-session lookup, fetch and write counters
//!
//! # Example
//!
//! ```rust,ignore
//! use translation_session::i18n::{LanguageDescriptor, LanguageRegistry};
//!
//! let registry = LanguageRegistry::new(vec![
//!     LanguageDescriptor::new("English", "en"),
//!     LanguageDescriptor::new("Français", "fr"),
//! ]);
//! assert!(registry.contains("fr"));
//! ```

mod metrics;
mod registry;

pub use metrics::{MetricsReport, SessionMetrics};
pub use registry::{LanguageDescriptor, LanguageRegistry};
