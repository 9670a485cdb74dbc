//! # 배치 영속화 파이프라인
//!
//! ```text
//! StreamConsumer ─offer─▶ BatchCollector ─drain─▶ BatchCommitter ─dispatch─▶ CommandRegistry
//!                                                      │                          │
//!                                                      │                    CommandHandler
//!                                                      │                          │
//!                                                 ack / nack ◀── Settlement ── PersistencePort
//! ```
//!
//! 엔티티마다 수집기와 커미터가 한 쌍씩 있고, [`CommitScheduler`]가 커미터들을 주기적으로 깨웁니다.

pub mod collector;
pub mod committer;
pub mod handlers;
pub mod notifier;
pub mod registry;
pub mod scheduler;

pub use collector::{BatchCollector, OfferOutcome};
pub use committer::{BatchCommitter, PassReport};
pub use handlers::{CommandHandler, RemoveRecordsHandler, SaveRecordsHandler};
pub use notifier::{EntityEvent, EventPublisher, LoggingEventPublisher, RedisEventPublisher};
pub use registry::{CommandRegistry, CommandRegistryBuilder, PersistencePorts};
pub use scheduler::CommitScheduler;
