use crate::prefs::PreferenceStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use tokio::task::JoinError;
use tracing::{debug, warn};
use url::Url;

pub const COOKIE_PREF_KEY: &str = "persistent_cookies";

/// Per-host cookie storage consulted by the request pipeline.
pub trait CookieStore: Send + Sync {
    /// Replaces the host's entry when `cookies` is non-empty.
    fn save_from_response(&self, url: &Url, cookies: &[String]);
    fn load_for_request(&self, url: &Url) -> Vec<String>;
    fn clear(&self);
}

/// Runs `op` against `store` on the blocking pool. [`CookieJar`] writes
/// through to disk on every change, so async callers go through here.
pub async fn with_store<R, F>(store: &Arc<dyn CookieStore>, op: F) -> Result<R, JoinError>
where
    R: Send + 'static,
    F: FnOnce(&dyn CookieStore) -> R + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&*store)).await
}

/// Builds a `Cookie` request header from stored `Set-Cookie` strings.
pub fn cookie_header(cookies: &[String]) -> Option<String> {
    let pairs: Vec<&str> = cookies
        .iter()
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

type HostMap = HashMap<String, Vec<String>>;

fn read_map(map: &RwLock<HostMap>) -> std::sync::RwLockReadGuard<'_, HostMap> {
    map.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_map(map: &RwLock<HostMap>) -> std::sync::RwLockWriteGuard<'_, HostMap> {
    map.write().unwrap_or_else(PoisonError::into_inner)
}

/// Cookies that live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    hosts: RwLock<HostMap>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn save_from_response(&self, url: &Url, cookies: &[String]) {
        if cookies.is_empty() {
            return;
        }
        if let Some(host) = url.host_str() {
            write_map(&self.hosts).insert(host.to_string(), cookies.to_vec());
        }
    }

    fn load_for_request(&self, url: &Url) -> Vec<String> {
        url.host_str()
            .and_then(|host| read_map(&self.hosts).get(host).cloned())
            .unwrap_or_default()
    }

    fn clear(&self) {
        write_map(&self.hosts).clear();
    }
}

/// Cookie store persisted as one JSON object `{host: [cookie, ...]}` under
/// [`COOKIE_PREF_KEY`].
///
/// The persisted map is read on first use. Every change is written through
/// immediately; writes are serialized by `persist_lock`.
pub struct CookieJar {
    prefs: Arc<dyn PreferenceStore>,
    hosts: RwLock<HostMap>,
    hydrated: OnceLock<()>,
    persist_lock: Mutex<()>,
}

impl CookieJar {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            prefs,
            hosts: RwLock::new(HashMap::new()),
            hydrated: OnceLock::new(),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn hosts(&self) -> Vec<String> {
        self.ensure_hydrated();
        let mut hosts: Vec<String> = read_map(&self.hosts).keys().cloned().collect();
        hosts.sort();
        hosts
    }

    fn ensure_hydrated(&self) {
        self.hydrated.get_or_init(|| {
            let restored = self.read_persisted();
            debug!(hosts = restored.len(), "Cookie jar hydrated");
            write_map(&self.hosts).extend(restored);
        });
    }

    fn read_persisted(&self) -> HostMap {
        let payload = match self.prefs.get(COOKIE_PREF_KEY) {
            Ok(Some(payload)) => payload,
            Ok(None) => return HashMap::new(),
            Err(err) => {
                warn!(error = %err, "Failed to read persisted cookies");
                return HashMap::new();
            }
        };
        match serde_json::from_str::<HostMap>(&payload) {
            Ok(mut map) => {
                for cookies in map.values_mut() {
                    cookies.retain(|cookie| !cookie.is_empty());
                }
                map.retain(|_, cookies| !cookies.is_empty());
                map
            }
            Err(err) => {
                warn!(error = %err, "Discarding unreadable persisted cookies");
                HashMap::new()
            }
        }
    }

    fn persist(&self, map: &HostMap) {
        let payload = match serde_json::to_string(map) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "Failed to serialize cookies");
                return;
            }
        };
        if let Err(err) = self.prefs.put(COOKIE_PREF_KEY, &payload) {
            warn!(error = %err, "Failed to persist cookies");
        }
    }
}

impl CookieStore for CookieJar {
    fn save_from_response(&self, url: &Url, cookies: &[String]) {
        if cookies.is_empty() {
            return;
        }
        let Some(host) = url.host_str() else {
            return;
        };
        self.ensure_hydrated();
        let _persist = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = {
            let mut hosts = write_map(&self.hosts);
            hosts.insert(host.to_string(), cookies.to_vec());
            hosts.clone()
        };
        self.persist(&snapshot);
    }

    fn load_for_request(&self, url: &Url) -> Vec<String> {
        self.ensure_hydrated();
        url.host_str()
            .and_then(|host| read_map(&self.hosts).get(host).cloned())
            .unwrap_or_default()
    }

    fn clear(&self) {
        self.ensure_hydrated();
        let _persist = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        write_map(&self.hosts).clear();
        self.persist(&HashMap::new());
    }
}
