//! Placeholder memoization.
//!
//! Placeholders cost a transform-engine round trip plus a read of the
//! rendered bytes, so they are memoized for the lifetime of the process under
//! a deterministic key (`placeholder-<asset id>-<width>-<height>`).
//!
//! The memo is a capability handed to the planner through
//! [`Services`](crate::Services): [`MemoryMemo`] in production, [`NoMemo`]
//! when a test needs every call to reach the engine. Concurrent callers may
//! race to compute the same key; the stored value is a pure function of the
//! key, so last-write-wins is harmless.

use std::collections::HashMap;
use std::sync::Mutex;

/// String-keyed cache of computed strings.
pub trait Memo: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// Process-local memo backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryMemo {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Memo for MemoryMemo {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        // A poisoned lock only costs a recomputation later.
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }
}

/// Memo that never remembers anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemo;

impl Memo for NoMemo {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String) {}
}

/// Return the memoized value for `key`, computing and storing it on a miss.
///
/// Errors are not memoized.
pub fn once<E>(
    memo: &dyn Memo,
    key: &str,
    compute: impl FnOnce() -> Result<String, E>,
) -> Result<String, E> {
    if let Some(hit) = memo.get(key) {
        return Ok(hit);
    }
    let value = compute()?;
    memo.set(key, value.clone());
    Ok(value)
}

/// Memo key of a placeholder.
pub fn placeholder_key(asset_id: &str, width: u32, height: u32) -> String {
    format!("placeholder-{asset_id}-{width}-{height}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn memory_memo_roundtrip() {
        let memo = MemoryMemo::new();
        assert!(memo.is_empty());
        memo.set("k", "v".into());
        assert_eq!(memo.get("k"), Some("v".to_string()));
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn no_memo_forgets() {
        let memo = NoMemo;
        memo.set("k", "v".into());
        assert_eq!(memo.get("k"), None);
    }

    #[test]
    fn once_computes_a_single_time() {
        let memo = MemoryMemo::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>("value".to_string())
        };

        assert_eq!(once(&memo, "k", compute).unwrap(), "value");
        assert_eq!(once(&memo, "k", compute).unwrap(), "value");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn once_does_not_store_errors() {
        let memo = MemoryMemo::new();
        let result = once(&memo, "k", || Err::<String, _>("boom"));
        assert_eq!(result, Err("boom"));
        assert!(memo.get("k").is_none());
    }

    #[test]
    fn once_with_no_memo_always_computes() {
        let calls = Cell::new(0);
        for _ in 0..3 {
            once(&NoMemo, "k", || {
                calls.set(calls.get() + 1);
                Ok::<_, ()>(String::new())
            })
            .unwrap();
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn placeholder_key_format() {
        assert_eq!(placeholder_key("main::a.jpg", 32, 21), "placeholder-main::a.jpg-32-21");
    }
}
