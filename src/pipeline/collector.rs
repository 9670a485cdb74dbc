//! 엔티티별 배치 수집기
//!
//! 여러 소비자가 동시에 [`BatchCollector::offer`]를 호출하고, 커미터 하나가 주기적으로
//! [`BatchCollector::drain`]으로 전부 가져갑니다. 잠금은 크기 확인과 push 동안만 잡히며
//! `.await` 너머로 유지되지 않습니다.

use std::sync::{Mutex, PoisonError};

use log::{error, warn};

use crate::domain::{EntityKind, MessageEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// prefetch 한도 초과. 봉투는 재큐잉 nack 되었습니다.
    Rejected,
}

pub struct BatchCollector {
    entity: EntityKind,
    prefetch: usize,
    queue: Mutex<Vec<MessageEnvelope>>,
}

impl BatchCollector {
    pub fn new(entity: EntityKind, prefetch: usize) -> Self {
        Self {
            entity,
            prefetch,
            queue: Mutex::new(Vec::with_capacity(prefetch)),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn prefetch(&self) -> usize {
        self.prefetch
    }

    /// 대기 중인 봉투가 prefetch 미만이면 받아들입니다.
    ///
    /// 거부된 봉투는 버려지지 않고 채널에 `nack(requeue=true)` 됩니다.
    pub async fn offer(&self, envelope: MessageEnvelope) -> OfferOutcome {
        let rejected = {
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            if queue.len() < self.prefetch {
                queue.push(envelope);
                None
            } else {
                Some(envelope)
            }
        };

        let Some(envelope) = rejected else {
            return OfferOutcome::Accepted;
        };

        warn!(
            "수집기 가득 참, 메시지 재큐잉 - entity: {}, prefetch: {}, delivery_tag: {}",
            self.entity, self.prefetch, envelope.delivery_tag
        );
        if let Err(e) = envelope.channel.nack(envelope.delivery_tag, true).await {
            error!(
                "재큐잉 nack 실패 - entity: {}, delivery_tag: {}, reason: {}",
                self.entity, envelope.delivery_tag, e
            );
        }
        OfferOutcome::Rejected
    }

    /// 대기 중인 봉투를 모두 꺼내고 큐를 비웁니다.
    pub fn drain(&self) -> Vec<MessageEnvelope> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *queue)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.prefetch.saturating_sub(self.len())
    }
}
