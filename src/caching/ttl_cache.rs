//! # 이름 붙은 로컬 TTL 캐시
//!
//! 프로세스 안에서만 유지되는 제한 크기의 만료 캐시입니다.
//! 자격증명 저장소가 복호화 결과를 보관하는 데 사용하며, 값은 보통 `Arc<T>`입니다.
//!
//! `moka::sync::Cache` 위에 이름과 설정을 얹은 얇은 래퍼입니다.
//!
//! ## 만료와 축출
//!
//! - `ttl`보다 오래된 항목은 조회 시 없는 것으로 취급됩니다.
//! - 용량(`max_entries`)을 넘으면 moka의 축출 정책에 따라 항목이 빠집니다.
//! - 만료/축출 정리는 캐시 연산 중에 moka가 처리합니다.

use std::borrow::Borrow;
use std::hash::Hash;
use std::time::Duration;

use moka::sync::Cache;

use crate::config::CacheSettings;

pub struct TtlCache<K, V> {
    name: String,
    ttl: Duration,
    inner: Cache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(settings: CacheSettings) -> Self {
        let inner = Cache::builder()
            .name(&settings.name)
            .max_capacity(settings.max_entries as u64)
            .time_to_live(settings.ttl)
            .build();

        Self {
            name: settings.name,
            ttl: settings.ttl,
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 만료되지 않은 값을 조회합니다.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key)
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.invalidate(key);
    }

    /// 대기 중인 정리 작업을 반영한 뒤의 항목 수
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn cache(ttl: Duration, max_entries: usize) -> TtlCache<String, u32> {
        TtlCache::new(CacheSettings::new("test", ttl, max_entries))
    }

    #[test]
    fn test_put_and_get() {
        let cache = cache(Duration::from_secs(60), 10);
        cache.put("a".to_string(), 1);

        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.name(), "test");
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted() {
        let cache = cache(Duration::from_millis(20), 10);
        cache.put("a".to_string(), 1);
        sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let cache = cache(Duration::from_secs(60), 10);
        cache.put("a".to_string(), 1);
        cache.invalidate("a");

        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let cache = cache(Duration::from_secs(60), 2);
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("a".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(3));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_size_is_bounded() {
        let cache = cache(Duration::from_secs(60), 5);
        for i in 0..50 {
            cache.put(format!("key-{}", i), i);
        }

        assert!(cache.len() <= 5);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = cache(Duration::from_secs(60), 0);
        cache.put("a".to_string(), 1);

        assert!(cache.is_empty());
    }
}
