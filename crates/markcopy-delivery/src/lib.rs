//! Markcopy Delivery — gets conversion commands to per-page agents.
//!
//! Validates the target tab, tries a resident agent first, then injects the
//! agent and confirms readiness with progressive backoff, retrying the
//! inject path a bounded number of times. Each dispatch runs its own
//! explicit state machine; terminal failures always reach the user.

pub mod config;
pub mod coordinator;
pub mod host;
pub mod state;
pub mod url;

pub use config::DeliveryConfig;
pub use coordinator::{
    Delivery, DeliveryCoordinator, DeliveryPath, DELIVERY_FAILED_MESSAGE, NOTIFICATION_TITLE,
    RESTRICTED_PAGE_MESSAGE,
};
pub use host::{BrowserHost, LogNotifier, Notifier, RecordingNotifier};
pub use state::{DeliveryMachine, DeliveryState, TransitionRecord};
pub use url::{check_url, is_restricted_url};
