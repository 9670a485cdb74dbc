//! 브로커 메시지 봉투와 정산(ack/nack) 결정

use std::fmt;
use std::sync::Arc;

use log::{error, warn};

use crate::broker::BrokerChannel;
use crate::domain::command::CommandKind;

/// 브로커로부터 전달된 메시지 하나
///
/// `delivery_tag`는 채널 안에서 유일하며, 커미터는 봉투마다 정확히 한 번 ack 또는 nack 합니다.
pub struct MessageEnvelope {
    pub command_code: String,
    pub payload: serde_json::Value,
    pub delivery_tag: u64,
    pub channel: Arc<dyn BrokerChannel>,
}

impl MessageEnvelope {
    pub fn new(
        command_code: impl Into<String>,
        payload: serde_json::Value,
        delivery_tag: u64,
        channel: Arc<dyn BrokerChannel>,
    ) -> Self {
        Self {
            command_code: command_code.into(),
            payload,
            delivery_tag,
            channel,
        }
    }
}

// payload에는 평문 비밀값이 실릴 수 있으므로 출력하지 않는다
impl fmt::Debug for MessageEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEnvelope")
            .field("command_code", &self.command_code)
            .field("delivery_tag", &self.delivery_tag)
            .field("channel", &self.channel.name())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ack,
    Nack { requeue: bool },
}

/// 봉투 하나에 대한 최종 결정
#[derive(Debug)]
pub struct Settlement {
    pub envelope: MessageEnvelope,
    pub kind: Option<CommandKind>,
    pub record_id: Option<String>,
    pub decision: Decision,
}

impl Settlement {
    pub fn ack(envelope: MessageEnvelope, kind: CommandKind, record_id: String) -> Self {
        Self {
            envelope,
            kind: Some(kind),
            record_id: Some(record_id),
            decision: Decision::Ack,
        }
    }

    /// 일시적 실패. 브로커가 다시 전달합니다.
    pub fn retry(envelope: MessageEnvelope, kind: CommandKind, record_id: Option<String>) -> Self {
        Self {
            envelope,
            kind: Some(kind),
            record_id,
            decision: Decision::Nack { requeue: true },
        }
    }

    /// 처리할 수 없는 메시지. 재큐잉 없이 데드레터로 보냅니다.
    pub fn reject(envelope: MessageEnvelope, kind: Option<CommandKind>) -> Self {
        Self {
            envelope,
            kind,
            record_id: None,
            decision: Decision::Nack { requeue: false },
        }
    }

    /// 결정을 브로커 채널에 반영합니다.
    ///
    /// 채널 오류는 로그로만 남깁니다. 확인되지 않은 메시지는 브로커가 재전달합니다.
    pub async fn apply(&self) -> Decision {
        let envelope = &self.envelope;
        let result = match self.decision {
            Decision::Ack => envelope.channel.ack(envelope.delivery_tag).await,
            Decision::Nack { requeue } => {
                envelope.channel.nack(envelope.delivery_tag, requeue).await
            }
        };

        if let Err(e) = result {
            error!(
                "정산 반영 실패 - channel: {}, delivery_tag: {}, decision: {:?}, reason: {}",
                envelope.channel.name(),
                envelope.delivery_tag,
                self.decision,
                e
            );
        } else if let Decision::Nack { requeue: false } = self.decision {
            warn!(
                "메시지 데드레터 처리 - channel: {}, delivery_tag: {}, command: {}",
                envelope.channel.name(),
                envelope.delivery_tag,
                envelope.command_code
            );
        }

        self.decision
    }
}
