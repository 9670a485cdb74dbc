//! 커밋 스케줄러
//!
//! 커미터마다 고정 간격의 작업을 하나씩 띄웁니다. 한 엔티티의 느린 영속화가 다른 엔티티의
//! 패스를 막지 않습니다. 종료 신호를 받으면 각 작업이 마지막 패스를 한 번 더 돌려
//! 이미 수집된 봉투도 ack/nack 을 받게 합니다.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::committer::{BatchCommitter, PassReport};

pub struct CommitScheduler {
    committers: Vec<Arc<BatchCommitter>>,
    interval: Duration,
}

impl CommitScheduler {
    pub fn new(committers: Vec<Arc<BatchCommitter>>, interval: Duration) -> Self {
        Self { committers, interval }
    }

    /// 모든 커미터 작업이 마지막 패스까지 끝나면 반환 핸들이 완료됩니다.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "⏱️ 커밋 스케줄러 시작 - committers: {}, interval: {:?}",
                self.committers.len(),
                self.interval
            );

            let interval = self.interval;
            let workers = self
                .committers
                .into_iter()
                .map(|committer| tokio::spawn(run_committer(committer, interval, shutdown.clone())));

            for result in join_all(workers).await {
                if let Err(e) = result {
                    error!("커밋 작업 비정상 종료: {}", e);
                }
            }
            info!("🛑 커밋 스케줄러 종료");
        })
    }
}

async fn run_committer(committer: Arc<BatchCommitter>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if committer.run_pass().await == PassReport::Skipped {
                    debug!("이전 패스 진행 중 - entity: {}", committer.entity());
                }
            }
        }
    }

    debug!("마지막 커밋 패스 - entity: {}", committer.entity());
    committer.run_pass().await;
}
