use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<String, (Arc<Mutex<()>>, Instant)>>;

static LOCKS: OnceLock<LockMap> = OnceLock::new();

const IDLE_EVICT_AFTER: Duration = Duration::from_secs(60);

fn locks() -> &'static LockMap {
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Holds a per-key lock; drop to release. Keeps alert-dedup updates and
/// correlation-partition writes linearizable per fingerprint without a
/// database-level `SELECT ... FOR UPDATE` (spec §5).
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Acquires the named key's lock, creating it on first use. Entries idle
/// longer than a minute are pruned opportunistically on each call.
pub async fn lock_key(key: &str) -> KeyGuard {
    let mutex = {
        let mut map = locks().lock().await;
        map.retain(|_, (lock, last_used)| {
            Arc::strong_count(lock) > 1 || last_used.elapsed() < IDLE_EVICT_AFTER
        });
        map.entry(key.to_string())
            .or_insert_with(|| (Arc::new(Mutex::new(())), Instant::now()))
            .0
            .clone()
    };
    let guard = mutex.lock_owned().await;
    KeyGuard { _guard: guard }
}
