//! 캐싱 계층 모듈
//!
//! # 구성
//!
//! - [`ttl_cache`] - 프로세스 로컬 TTL 캐시 (복호화된 자격증명 보관)
//! - [`redis`] - 분산 상태(레이트 리미터, 이벤트, 스트림)를 위한 Redis 연결
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use crate::caching::ttl_cache::TtlCache;
//! use crate::config::CacheSettings;
//!
//! let cache: TtlCache<String, Arc<RegisteredClient>> =
//!     TtlCache::new(CacheSettings::for_name("credentials-by-id", Duration::from_secs(300), 1_000));
//! cache.put(client.id.clone(), client.clone());
//! let hit = cache.get("rc-1");
//! ```

pub mod redis;
pub mod ttl_cache;

pub use ttl_cache::TtlCache;
