//! Product directory: models, engagement toggles and the moderation
//! state machine.

pub mod catalog;
pub mod engagement;
pub mod product;

pub use catalog::ProductCatalog;
pub use engagement::{EngagementKind, ToggleOutcome};
pub use product::{Product, ProductDraft, ProductStatus};
