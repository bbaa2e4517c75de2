//! Shared fixtures for cache integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use branchline_cache::{CacheConfig, CacheSession, DashboardTransport, TransportError};
use branchline_model::{
	Branch, BranchId, BranchPatch, BranchSettings, Business, BusinessId, NewBranch, NewBusiness, Role, SettingsPatch,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Installs a test-writer subscriber so `cache.*` events show up under `--nocapture`.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

pub fn timestamp() -> DateTime<Utc> {
	DateTime::from_timestamp(1_767_225_600, 0).unwrap()
}

pub fn business(id: &str, role: Role) -> Business {
	Business {
		id: BusinessId::new(id),
		name: format!("Business {id}"),
		description: None,
		created_at: timestamp(),
		role,
	}
}

pub fn branch(business_id: &str, id: &str, is_main: bool) -> Branch {
	Branch {
		id: BranchId::new(id),
		business_id: BusinessId::new(business_id),
		name: format!("Branch {id}"),
		code: None,
		address: None,
		active: true,
		is_main,
	}
}

pub fn saved_settings(business_id: &str, default_branch: Option<&str>) -> BranchSettings {
	BranchSettings {
		default_branch_id: default_branch.map(BranchId::new),
		updated_at: Some(timestamp()),
		..BranchSettings::defaults_for(BusinessId::new(business_id))
	}
}

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct Calls {
	pub list_businesses: AtomicUsize,
	pub list_branches: AtomicUsize,
	pub get_settings: AtomicUsize,
	pub writes: AtomicUsize,
	pub update_settings: AtomicUsize,
}

impl Calls {
	pub fn count(counter: &AtomicUsize) -> usize {
		counter.load(Ordering::SeqCst)
	}
}

#[derive(Default)]
struct Data {
	businesses: Vec<Business>,
	branches: HashMap<BusinessId, Vec<Branch>>,
	settings: HashMap<BusinessId, BranchSettings>,
	next_id: usize,
}

/// In-memory server of record.
#[derive(Default)]
pub struct FakeTransport {
	data: Mutex<Data>,
	pub calls: Calls,
	/// Patches received by `update_settings`, in order.
	pub settings_patches: Mutex<Vec<SettingsPatch>>,
	/// Error returned by the next write instead of applying it.
	fail_next_write: Mutex<Option<TransportError>>,
	/// When set, `list_branches` waits for a notification before answering.
	branches_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn with_business(self: Arc<Self>, business: Business, branches: Vec<Branch>, settings: Option<BranchSettings>) -> Arc<Self> {
		{
			let mut data = self.data.lock();
			if let Some(settings) = settings {
				data.settings.insert(business.id.clone(), settings);
			}
			data.branches.insert(business.id.clone(), branches);
			data.businesses.push(business);
		}
		self
	}

	pub fn fail_next_write(&self, error: TransportError) {
		*self.fail_next_write.lock() = Some(error);
	}

	/// Holds every subsequent `list_branches` call until the returned gate is notified.
	pub fn gate_branches(&self) -> Arc<Notify> {
		let gate = Arc::new(Notify::new());
		*self.branches_gate.lock() = Some(Arc::clone(&gate));
		gate
	}

	pub fn stored_settings(&self, business_id: &BusinessId) -> Option<BranchSettings> {
		self.data.lock().settings.get(business_id).cloned()
	}

	pub fn session(self: &Arc<Self>) -> CacheSession {
		let transport: Arc<dyn DashboardTransport> = Arc::clone(self) as Arc<dyn DashboardTransport>;
		CacheSession::new(transport, CacheConfig::default())
	}

	fn begin_write(&self) -> Result<(), TransportError> {
		self.calls.writes.fetch_add(1, Ordering::SeqCst);
		match self.fail_next_write.lock().take() {
			Some(error) => Err(error),
			None => Ok(()),
		}
	}
}

fn not_found(what: impl std::fmt::Display) -> TransportError {
	TransportError::NotFound(what.to_string())
}

#[async_trait]
impl DashboardTransport for FakeTransport {
	async fn list_businesses(&self) -> Result<Vec<Business>, TransportError> {
		self.calls.list_businesses.fetch_add(1, Ordering::SeqCst);
		Ok(self.data.lock().businesses.clone())
	}

	async fn list_branches(&self, business_id: &BusinessId) -> Result<Vec<Branch>, TransportError> {
		self.calls.list_branches.fetch_add(1, Ordering::SeqCst);
		let gate = self.branches_gate.lock().clone();
		if let Some(gate) = gate {
			gate.notified().await;
		}
		Ok(self.data.lock().branches.get(business_id).cloned().unwrap_or_default())
	}

	async fn get_settings(&self, business_id: &BusinessId) -> Result<Option<BranchSettings>, TransportError> {
		self.calls.get_settings.fetch_add(1, Ordering::SeqCst);
		Ok(self.data.lock().settings.get(business_id).cloned())
	}

	async fn create_business(&self, payload: &NewBusiness) -> Result<Business, TransportError> {
		self.begin_write()?;
		let mut data = self.data.lock();
		data.next_id += 1;
		let created = Business {
			id: BusinessId::new(format!("b-new-{}", data.next_id)),
			name: payload.name.clone(),
			description: payload.description.clone(),
			created_at: timestamp(),
			role: Role::Owner,
		};
		data.businesses.push(created.clone());
		Ok(created)
	}

	async fn delete_business(&self, business_id: &BusinessId) -> Result<(), TransportError> {
		self.begin_write()?;
		let mut data = self.data.lock();
		let before = data.businesses.len();
		data.businesses.retain(|b| &b.id != business_id);
		if data.businesses.len() == before {
			return Err(not_found(business_id));
		}
		data.branches.remove(business_id);
		data.settings.remove(business_id);
		Ok(())
	}

	async fn create_branch(&self, business_id: &BusinessId, payload: &NewBranch) -> Result<Branch, TransportError> {
		self.begin_write()?;
		let mut data = self.data.lock();
		data.next_id += 1;
		let created = Branch {
			id: BranchId::new(format!("br-new-{}", data.next_id)),
			business_id: business_id.clone(),
			name: payload.name.clone(),
			code: payload.code.clone(),
			address: payload.address.clone(),
			active: payload.active,
			is_main: payload.is_main,
		};
		data.branches.entry(business_id.clone()).or_default().push(created.clone());
		Ok(created)
	}

	async fn update_branch(&self, business_id: &BusinessId, branch_id: &BranchId, patch: &BranchPatch) -> Result<Branch, TransportError> {
		self.begin_write()?;
		let mut data = self.data.lock();
		let branches = data.branches.get_mut(business_id).ok_or_else(|| not_found(business_id))?;
		if patch.is_main == Some(true) {
			for other in branches.iter_mut() {
				other.is_main = false;
			}
		}
		let branch = branches.iter_mut().find(|b| &b.id == branch_id).ok_or_else(|| not_found(branch_id))?;
		if let Some(name) = &patch.name {
			branch.name = name.clone();
		}
		if let Some(code) = &patch.code {
			branch.code = code.clone();
		}
		if let Some(address) = &patch.address {
			branch.address = address.clone();
		}
		if let Some(active) = patch.active {
			branch.active = active;
		}
		if let Some(is_main) = patch.is_main {
			branch.is_main = is_main;
		}
		Ok(branch.clone())
	}

	async fn delete_branch(&self, business_id: &BusinessId, branch_id: &BranchId) -> Result<(), TransportError> {
		self.begin_write()?;
		let mut data = self.data.lock();
		let branches = data.branches.get_mut(business_id).ok_or_else(|| not_found(business_id))?;
		branches.retain(|b| &b.id != branch_id);
		Ok(())
	}

	async fn update_settings(&self, business_id: &BusinessId, patch: &SettingsPatch) -> Result<BranchSettings, TransportError> {
		self.calls.update_settings.fetch_add(1, Ordering::SeqCst);
		self.settings_patches.lock().push(patch.clone());
		self.begin_write()?;
		let mut data = self.data.lock();
		let current = data
			.settings
			.get(business_id)
			.cloned()
			.unwrap_or_else(|| BranchSettings::defaults_for(business_id.clone()));
		let stored = BranchSettings {
			updated_at: Some(timestamp()),
			..patch.apply_to(&current)
		};
		data.settings.insert(business_id.clone(), stored.clone());
		Ok(stored)
	}
}
