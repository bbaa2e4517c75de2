//! Domain model for the business dashboard.
//!
//! Entities as they come back from the server of record, plus the two pure
//! policies that run before any write leaves the client:
//!
//! - [`reconcile`]: diffs an edited settings form against last-known server
//!   settings and produces the minimal partial payload.
//! - [`guard`]: keeps the branch set consistent (single main branch, default
//!   branch references that resolve).
//!
//! Values entering a cache pass once through [`Normalize`] so read sites never
//! re-apply fallback defaults.

mod entity;
mod error;
mod id;
mod normalize;

pub mod guard;
pub mod reconcile;

pub use entity::{
	Branch, BranchPatch, BranchSettings, Business, CatalogMode, InventoryMode, NewBranch, NewBusiness, Role, ServicesMode,
};
pub use error::GuardError;
pub use id::{BranchId, BusinessId};
pub use normalize::{Normalize, normalize_branches, settings_or_defaults};
pub use reconcile::{Reconciliation, SettingsForm, SettingsPatch};
