//! 배치 커미터
//!
//! 한 패스는 수집기를 비우고, 레지스트리로 디스패치하고, 봉투마다 정확히 한 번 ack/nack 합니다.
//! 이전 패스가 아직 진행 중이면 새 패스는 아무것도 하지 않고 [`PassReport::Skipped`]를 돌려줍니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info, warn};

use super::collector::BatchCollector;
use super::notifier::{EntityEvent, EventPublisher};
use super::registry::CommandRegistry;
use crate::domain::{Decision, EntityKind, Settlement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReport {
    /// 이전 패스가 진행 중
    Skipped,
    /// 대기 중인 봉투 없음
    Idle,
    Committed {
        acked: usize,
        nacked: usize,
        dead_lettered: usize,
    },
}

pub struct BatchCommitter {
    collector: Arc<BatchCollector>,
    registry: Arc<CommandRegistry>,
    publisher: Arc<dyn EventPublisher>,
    persist_timeout: Duration,
    running: AtomicBool,
}

// 패닉이 나도 실행 플래그가 풀리도록 drop 에서 해제
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BatchCommitter {
    pub fn new(
        collector: Arc<BatchCollector>,
        registry: Arc<CommandRegistry>,
        publisher: Arc<dyn EventPublisher>,
        persist_timeout: Duration,
    ) -> Self {
        Self {
            collector,
            registry,
            publisher,
            persist_timeout,
            running: AtomicBool::new(false),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.collector.entity()
    }

    pub async fn run_pass(&self) -> PassReport {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("커밋 패스 진행 중, 건너뜀 - entity: {}", self.entity());
            return PassReport::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let batch = self.collector.drain();
        if batch.is_empty() {
            return PassReport::Idle;
        }

        let size = batch.len();
        let settlements = self.registry.dispatch(self.entity(), batch, self.persist_timeout).await;
        if settlements.len() != size {
            warn!(
                "정산 수 불일치 - entity: {}, batch: {}, settlements: {}",
                self.entity(),
                size,
                settlements.len()
            );
        }

        let (mut acked, mut nacked, mut dead_lettered) = (0, 0, 0);
        for settlement in &settlements {
            match settlement.apply().await {
                Decision::Ack => {
                    acked += 1;
                    self.notify_created(settlement);
                }
                Decision::Nack { requeue: true } => nacked += 1,
                Decision::Nack { requeue: false } => dead_lettered += 1,
            }
        }

        info!(
            "커밋 패스 완료 - entity: {}, acked: {}, nacked: {}, dead_lettered: {}",
            self.entity(),
            acked,
            nacked,
            dead_lettered
        );
        PassReport::Committed {
            acked,
            nacked,
            dead_lettered,
        }
    }

    fn notify_created(&self, settlement: &Settlement) {
        let Some(kind) = settlement.kind else {
            return;
        };
        let (Some(event_type), Some(record_id)) = (kind.created_event(), settlement.record_id.as_ref())
        else {
            return;
        };

        let event = EntityEvent::new(event_type, kind.entity(), record_id.clone());
        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            let record_id = event.record_id.clone();
            if let Err(e) = publisher.publish(event).await {
                warn!("이벤트 발행 실패 - record_id: {}, reason: {}", record_id, e);
            }
        });
    }
}
