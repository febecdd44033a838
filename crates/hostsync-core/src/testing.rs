//! In-memory targets, conditions and bundle storage for unit tests

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bundle::{Bundle, BundleFactory, BundleInfo, format_bundle_id, parse_bundle_id};
use crate::condition::Condition;
use crate::context::SyncContext;
use crate::monitor::{BundleEvent, Monitor, TargetEvent};
use crate::setting::{KEY_LAST_UPDATE, Setting};
use crate::target::Target;
use crate::tokens::TokenResolver;
use crate::{Error, Result, time};

/// A monitor driven by hand: tests publish events with [`emit`](Self::emit).
#[derive(Debug)]
pub struct FakeMonitor<E> {
    running: AtomicBool,
    sender: broadcast::Sender<E>,
}

impl<E: Clone> Default for FakeMonitor<E> {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            sender: broadcast::channel(16).0,
        }
    }
}

impl<E: Clone> FakeMonitor<E> {
    pub fn emit(&self, event: E) {
        let _ = self.sender.send(event);
    }
}

impl<E: Clone + Send + 'static> Monitor<E> for FakeMonitor<E> {
    fn start_monitor(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_monitor(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_monitoring(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Shared, inspectable state behind a [`FakeTarget`].
#[derive(Debug, Default)]
pub struct FakeState {
    pub last_update: Mutex<Option<DateTime<Utc>>>,
    /// Contents exported, one setting each; imports replace them.
    pub contents: Mutex<Vec<Vec<u8>>>,
    /// Number of import calls received.
    pub imports: Mutex<usize>,
    pub fail_export: AtomicBool,
    pub fail_import: AtomicBool,
    /// Raise the context's cancel flag instead of doing any work.
    pub stop_processing: AtomicBool,
    pub monitor: FakeMonitor<TargetEvent>,
}

impl FakeState {
    pub fn set_last_update(&self, time: Option<DateTime<Utc>>) {
        *self.last_update.lock().unwrap() = time;
    }

    pub fn set_contents(&self, contents: &[&str]) {
        *self.contents.lock().unwrap() = contents.iter().map(|c| c.as_bytes().to_vec()).collect();
    }

    pub fn contents(&self) -> Vec<String> {
        self.contents
            .lock()
            .unwrap()
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }

    pub fn imports(&self) -> usize {
        *self.imports.lock().unwrap()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FakeTarget {
    #[serde(default)]
    pub label: String,
    #[serde(skip)]
    pub state: Arc<FakeState>,
}

impl FakeTarget {
    pub fn new() -> (Self, Arc<FakeState>) {
        let target = Self::default();
        let state = Arc::clone(&target.state);
        (target, state)
    }
}

#[async_trait]
impl Target for FakeTarget {
    fn type_name(&self) -> &'static str {
        "fake"
    }

    fn substitute(&mut self, tokens: &dyn TokenResolver) -> Result<()> {
        tokens.resolve_in_place(&mut self.label)
    }

    async fn export(&self, context: &SyncContext, _cancel: &CancellationToken) -> Result<Vec<Setting>> {
        if self.state.stop_processing.load(Ordering::SeqCst) {
            context.cancel_processing();
            return Ok(vec![Setting::empty()]);
        }
        if self.state.fail_export.load(Ordering::SeqCst) {
            return Err(Error::target("fake", "export failed"));
        }
        let stamp = self
            .state
            .last_update
            .lock()
            .unwrap()
            .map(|t| time::to_ticks(t).to_string());
        let contents = self.state.contents.lock().unwrap().clone();
        if contents.is_empty() {
            return Ok(vec![Setting::empty()]);
        }
        Ok(contents
            .into_iter()
            .map(|bytes| {
                let setting = Setting::from_bytes(bytes);
                match &stamp {
                    Some(stamp) => setting.with_metadata(KEY_LAST_UPDATE, stamp.clone()),
                    None => setting,
                }
            })
            .collect())
    }

    async fn import(
        &self,
        _context: &SyncContext,
        settings: Vec<Setting>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        *self.state.imports.lock().unwrap() += 1;
        if self.state.fail_import.load(Ordering::SeqCst) {
            return Err(Error::target("fake", "import failed"));
        }
        let mut contents = Vec::new();
        let mut latest = None;
        for setting in settings {
            let mut bytes = Vec::new();
            setting.content.open()?.read_to_end(&mut bytes)?;
            contents.push(bytes);
            latest = latest.max(setting.last_update()?);
        }
        *self.state.contents.lock().unwrap() = contents;
        if latest.is_some() {
            *self.state.last_update.lock().unwrap() = latest;
        }
        Ok(())
    }

    async fn last_update(
        &self,
        context: &SyncContext,
        _cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>> {
        if self.state.stop_processing.load(Ordering::SeqCst) {
            context.cancel_processing();
            return Ok(None);
        }
        Ok(*self.state.last_update.lock().unwrap())
    }

    fn monitor(&self) -> Option<&dyn Monitor<TargetEvent>> {
        Some(&self.state.monitor)
    }
}

#[derive(Debug, Deserialize)]
pub struct AlwaysCondition {
    pub value: bool,
}

#[async_trait]
impl Condition for AlwaysCondition {
    fn type_name(&self) -> &'static str {
        "always"
    }

    fn substitute(&mut self, _tokens: &dyn TokenResolver) -> Result<()> {
        Ok(())
    }

    async fn is_satisfied(&self, _cancel: &CancellationToken) -> Result<bool> {
        Ok(self.value)
    }
}

#[derive(Debug, Deserialize)]
pub struct FailingCondition;

#[async_trait]
impl Condition for FailingCondition {
    fn type_name(&self) -> &'static str {
        "failing"
    }

    fn substitute(&mut self, _tokens: &dyn TokenResolver) -> Result<()> {
        Ok(())
    }

    async fn is_satisfied(&self, _cancel: &CancellationToken) -> Result<bool> {
        Err(Error::target("failing", "cannot evaluate"))
    }
}

#[derive(Debug, Clone, Default)]
struct StoredBundle {
    profile_id: String,
    created: DateTime<Utc>,
    settings: Vec<(String, Setting)>,
    metadata: BTreeMap<String, BTreeMap<String, String>>,
    closed: bool,
}

type Store = Arc<Mutex<BTreeMap<String, StoredBundle>>>;

/// Bundle storage kept in memory. Writes are visible immediately, so a
/// partially written bundle can be observed; dropping it unclosed discards it.
#[derive(Debug, Default)]
pub struct MemoryBundleFactory {
    store: Store,
    pub monitor: FakeMonitor<BundleEvent>,
    pub fail_create: AtomicBool,
}

impl MemoryBundleFactory {
    pub fn ids(&self) -> Vec<String> {
        self.store.lock().unwrap().keys().cloned().collect()
    }

    pub fn is_closed(&self, id: &str) -> bool {
        self.store.lock().unwrap().get(id).is_some_and(|b| b.closed)
    }

    /// Insert an empty, closed bundle created at `created`.
    pub fn insert_empty(&self, profile_id: &str, created: DateTime<Utc>) -> String {
        let id = format_bundle_id(profile_id, created);
        self.store.lock().unwrap().insert(
            id.clone(),
            StoredBundle {
                profile_id: profile_id.to_string(),
                created,
                closed: true,
                ..StoredBundle::default()
            },
        );
        id
    }

    /// Overwrite a target's metadata value in a stored bundle.
    pub fn set_metadata(&self, id: &str, target_id: &str, key: &str, value: &str) {
        let mut store = self.store.lock().unwrap();
        let bundle = store.get_mut(id).unwrap();
        bundle
            .metadata
            .entry(target_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn metadata_of(&self, id: &str, target_id: &str) -> BTreeMap<String, String> {
        self.store.lock().unwrap()[id]
            .metadata
            .get(target_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl BundleFactory for MemoryBundleFactory {
    async fn create(
        &self,
        profile_id: &str,
        timestamp: DateTime<Utc>,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn Bundle>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Archive {
                bundle: profile_id.to_string(),
                message: "cannot create".into(),
            });
        }
        let id = format_bundle_id(profile_id, timestamp);
        let created = parse_bundle_id(&id).map_or(timestamp, |(_, t)| t);
        self.store.lock().unwrap().insert(
            id.clone(),
            StoredBundle {
                profile_id: profile_id.to_string(),
                created,
                ..StoredBundle::default()
            },
        );
        Ok(Box::new(MemoryBundle {
            id,
            store: Arc::clone(&self.store),
            writable: true,
        }))
    }

    async fn open(&self, id: &str, _cancel: &CancellationToken) -> Result<Box<dyn Bundle>> {
        if !self.store.lock().unwrap().contains_key(id) {
            return Err(Error::BundleNotFound { id: id.to_string() });
        }
        Ok(Box::new(MemoryBundle {
            id: id.to_string(),
            store: Arc::clone(&self.store),
            writable: false,
        }))
    }

    async fn get_all(&self, profile_id: &str, _cancel: &CancellationToken) -> Result<Vec<BundleInfo>> {
        let store = self.store.lock().unwrap();
        let mut infos: Vec<BundleInfo> = store
            .iter()
            .filter(|(_, b)| b.profile_id == profile_id)
            .map(|(id, b)| BundleInfo {
                id: id.clone(),
                profile_id: b.profile_id.clone(),
                created: b.created,
                size: 0,
            })
            .collect();
        infos.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(infos)
    }

    async fn remove(&self, id: &str, _cancel: &CancellationToken) -> Result<()> {
        match self.store.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(Error::BundleNotFound { id: id.to_string() }),
        }
    }

    fn monitor(&self) -> Option<&dyn Monitor<BundleEvent>> {
        Some(&self.monitor)
    }
}

struct MemoryBundle {
    id: String,
    store: Store,
    writable: bool,
}

impl MemoryBundle {
    fn with_stored<R>(&self, f: impl FnOnce(&mut StoredBundle) -> R) -> Result<R> {
        let mut store = self.store.lock().unwrap();
        let bundle = store
            .get_mut(&self.id)
            .ok_or_else(|| Error::BundleNotFound { id: self.id.clone() })?;
        Ok(f(bundle))
    }

    fn require_mode(&self, writable: bool) -> Result<()> {
        if self.writable == writable {
            Ok(())
        } else {
            Err(Error::BundleMode {
                bundle: self.id.clone(),
                expected: if writable { "write" } else { "read" },
            })
        }
    }
}

impl Drop for MemoryBundle {
    fn drop(&mut self) {
        if !self.writable {
            return;
        }
        let mut store = self.store.lock().unwrap();
        if store.get(&self.id).is_some_and(|b| !b.closed) {
            store.remove(&self.id);
        }
    }
}

impl Bundle for MemoryBundle {
    fn id(&self) -> &str {
        &self.id
    }

    fn put_setting(
        &mut self,
        target_id: &str,
        setting: &Setting,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        self.require_mode(true)?;
        let mut bytes = Vec::new();
        setting.content.open()?.read_to_end(&mut bytes)?;
        let stored = Setting {
            id: setting.id.clone(),
            content: crate::setting::SettingContent::Bytes(bytes),
            metadata: setting.metadata.clone(),
        };
        let name = format!("{}/{}", target_id, setting.id.as_deref().unwrap_or_default());
        self.with_stored(|b| b.settings.push((target_id.to_string(), stored)))?;
        Ok(name)
    }

    fn put_metadata(
        &mut self,
        target_id: &str,
        metadata: &BTreeMap<String, String>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        self.require_mode(true)?;
        self.with_stored(|b| {
            b.metadata
                .entry(target_id.to_string())
                .or_default()
                .extend(metadata.clone())
        })
    }

    fn settings(&mut self, target_id: &str, _cancel: &CancellationToken) -> Result<Vec<Setting>> {
        self.require_mode(false)?;
        self.with_stored(|b| {
            b.settings
                .iter()
                .filter(|(t, _)| t == target_id)
                .map(|(_, s)| s.clone())
                .collect()
        })
    }

    fn metadata(
        &mut self,
        target_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>> {
        self.with_stored(|b| b.metadata.get(target_id).cloned().unwrap_or_default())
    }

    fn close(self: Box<Self>) -> Result<()> {
        if self.writable {
            self.with_stored(|b| b.closed = true)?;
        }
        Ok(())
    }
}
