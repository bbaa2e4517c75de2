use std::sync::Arc;

use branchline_model::{Branch, BranchSettings, Business};

/// Value held by one cache entry.
///
/// Collections are shared slices so snapshots clone cheaply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValue {
	Businesses(Arc<[Business]>),
	Branches(Arc<[Branch]>),
	Settings(Arc<BranchSettings>),
}

impl EntityValue {
	pub fn businesses(businesses: Vec<Business>) -> Self {
		Self::Businesses(businesses.into())
	}

	pub fn branches(branches: Vec<Branch>) -> Self {
		Self::Branches(branches.into())
	}

	pub fn settings(settings: BranchSettings) -> Self {
		Self::Settings(Arc::new(settings))
	}

	pub fn as_businesses(&self) -> Option<&[Business]> {
		match self {
			Self::Businesses(list) => Some(list),
			_ => None,
		}
	}

	pub fn as_branches(&self) -> Option<&[Branch]> {
		match self {
			Self::Branches(list) => Some(list),
			_ => None,
		}
	}

	pub fn as_settings(&self) -> Option<&BranchSettings> {
		match self {
			Self::Settings(settings) => Some(settings),
			_ => None,
		}
	}
}
