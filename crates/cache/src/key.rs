//! Canonical cache keys.
//!
//! Keys are hierarchical: `businesses:list` is the root collection and each
//! business scopes `businesses:{id}:branches` and `businesses:{id}:settings`.
//! A missing or blank parent maps to [`SENTINEL_SEGMENT`] so disabled queries
//! can still be keyed; sentinel entries are never fetched and never hold data.

use std::fmt;

use branchline_model::BusinessId;

/// Parent segment used when a scoped key has no usable parent.
pub const SENTINEL_SEGMENT: &str = "unknown";

/// Logical entity collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
	/// All businesses visible to the caller.
	Businesses,
	/// Branches of one business.
	Branches,
	/// Operational settings of one business.
	Settings,
}

impl Collection {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Businesses => "list",
			Self::Branches => "branches",
			Self::Settings => "settings",
		}
	}
}

/// Parent reference of a business-scoped key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
	Business(BusinessId),
	/// The parent was absent or blank.
	Unknown,
}

impl ParentRef {
	fn from_option(parent: Option<&BusinessId>) -> Self {
		match parent {
			Some(id) if !id.is_blank() => Self::Business(id.clone()),
			_ => Self::Unknown,
		}
	}
}

impl fmt::Display for ParentRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Business(id) => write!(f, "{id}"),
			Self::Unknown => f.write_str(SENTINEL_SEGMENT),
		}
	}
}

/// Canonical identifier of one cached collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
	/// `businesses:list`
	BusinessList,
	/// `businesses:{id}:branches`
	Branches(ParentRef),
	/// `businesses:{id}:settings`
	Settings(ParentRef),
}

impl CacheKey {
	/// Key of a business's branch collection.
	pub fn branches(business_id: &BusinessId) -> Self {
		key_for(Collection::Branches, Some(business_id))
	}

	/// Key of a business's settings record.
	pub fn settings(business_id: &BusinessId) -> Self {
		key_for(Collection::Settings, Some(business_id))
	}

	pub fn collection(&self) -> Collection {
		match self {
			Self::BusinessList => Collection::Businesses,
			Self::Branches(_) => Collection::Branches,
			Self::Settings(_) => Collection::Settings,
		}
	}

	/// Returns the owning business, if the key is business-scoped and resolved.
	pub fn business(&self) -> Option<&BusinessId> {
		match self {
			Self::Branches(ParentRef::Business(id)) | Self::Settings(ParentRef::Business(id)) => Some(id),
			_ => None,
		}
	}

	/// Returns true for keys whose parent could not be resolved.
	pub fn is_sentinel(&self) -> bool {
		matches!(self, Self::Branches(ParentRef::Unknown) | Self::Settings(ParentRef::Unknown))
	}

	/// Returns true when the key lives under `business_id`.
	pub fn descends_from(&self, business_id: &BusinessId) -> bool {
		self.business() == Some(business_id)
	}
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::BusinessList => write!(f, "businesses:{}", Collection::Businesses.as_str()),
			Self::Branches(parent) => write!(f, "businesses:{parent}:{}", Collection::Branches.as_str()),
			Self::Settings(parent) => write!(f, "businesses:{parent}:{}", Collection::Settings.as_str()),
		}
	}
}

/// Maps a logical request onto its canonical key.
///
/// The parent is ignored for [`Collection::Businesses`]. Scoped collections
/// with an absent or blank parent yield a sentinel key instead of failing.
pub fn key_for(collection: Collection, parent: Option<&BusinessId>) -> CacheKey {
	match collection {
		Collection::Businesses => CacheKey::BusinessList,
		Collection::Branches => CacheKey::Branches(ParentRef::from_option(parent)),
		Collection::Settings => CacheKey::Settings(ParentRef::from_option(parent)),
	}
}
