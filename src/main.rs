//! 인증 영속화 서비스 메인 애플리케이션
//!
//! MongoDB, Redis 연결을 만들고 엔티티별 배치 파이프라인과 HTTP 서버를 구동합니다.
//! 서버가 멈추면 소비 루프를 취소하고 마지막 커밋 패스가 끝날 때까지 기다립니다.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, middleware, web};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use auth_persistence_service::broker::{RedisStreamChannel, StreamConsumer};
use auth_persistence_service::caching::redis::RedisClient;
use auth_persistence_service::caching::TtlCache;
use auth_persistence_service::config::{
    BrokerSettings, BucketSettings, CacheSettings, CipherSettings, Environment, MongoSettings,
    PipelineSettings, RedisSettings, ServerConfig,
};
use auth_persistence_service::db::Database;
use auth_persistence_service::domain::entities::{
    AuditEventRecord, AuthorizationRecord, ClientRecord, ConsentRecord,
};
use auth_persistence_service::middlewares::RateLimitMiddleware;
use auth_persistence_service::pipeline::{
    BatchCollector, BatchCommitter, CommandRegistry, CommitScheduler, EventPublisher,
    LoggingEventPublisher, PersistencePorts, RedisEventPublisher,
};
use auth_persistence_service::repositories::{CredentialRepository, MongoRecordStore};
use auth_persistence_service::routes::configure_all_routes;
use auth_persistence_service::security::cipher::build_cipher;
use auth_persistence_service::security::rate_limit::{DistributedRateLimiter, RedisBucketStore};

#[actix_web::main]
async fn main() -> io::Result<()> {
    load_env_file();
    init_logging();

    info!("🚀 인증 영속화 서비스 시작중...");

    let environment = Environment::current();
    let (database, redis) = initialize_data_stores().await?;

    let cipher = build_cipher(&CipherSettings::from_env().map_err(io::Error::other)?, &environment)
        .map_err(io::Error::other)?;
    info!("🔐 자격증명 암호기: {}", cipher.label());

    let clients = Arc::new(MongoRecordStore::<ClientRecord>::new(&database));
    let ports = PersistencePorts {
        clients: clients.clone(),
        authorizations: Arc::new(MongoRecordStore::<AuthorizationRecord>::new(&database)),
        consents: Arc::new(MongoRecordStore::<ConsentRecord>::new(&database)),
        audit_events: Arc::new(MongoRecordStore::<AuditEventRecord>::new(&database)),
    };
    let registry = Arc::new(
        CommandRegistry::builder()
            .with_standard_handlers(&ports, cipher.clone())
            .build()
            .map_err(io::Error::other)?,
    );

    let broker_settings = BrokerSettings::from_env();
    let publisher: Arc<dyn EventPublisher> = if broker_settings.publish_events {
        Arc::new(RedisEventPublisher::new(redis.clone(), broker_settings.events_channel.clone()))
    } else {
        Arc::new(LoggingEventPublisher)
    };

    // 파이프라인
    let shutdown = CancellationToken::new();
    let pipeline_settings = PipelineSettings::from_env();
    let mut committers = Vec::new();
    let mut consumers = Vec::new();
    for settings in &pipeline_settings.entities {
        let collector = Arc::new(BatchCollector::new(settings.entity, settings.prefetch));
        committers.push(Arc::new(BatchCommitter::new(
            collector.clone(),
            registry.clone(),
            publisher.clone(),
            settings.persist_timeout,
        )));

        let channel = Arc::new(RedisStreamChannel::new(
            broker_settings.stream_key(settings.entity),
            &broker_settings,
            redis.clone(),
        ));
        consumers.push(spawn_consumer(
            StreamConsumer::new(channel, collector, &broker_settings),
            shutdown.child_token(),
        ));
        info!(
            "📥 파이프라인 구성 - entity: {}, prefetch: {}, timeout: {:?}",
            settings.entity, settings.prefetch, settings.persist_timeout
        );
    }
    let scheduler = CommitScheduler::new(committers, pipeline_settings.commit_interval)
        .spawn(shutdown.clone());

    // 읽기 경로
    let repository = web::Data::new(CredentialRepository::new(
        clients,
        cipher,
        Arc::new(TtlCache::new(CacheSettings::for_name(
            "credentials-by-id",
            Duration::from_secs(300),
            10_000,
        ))),
        Arc::new(TtlCache::new(CacheSettings::for_name(
            "credentials-by-client-id",
            Duration::from_secs(300),
            10_000,
        ))),
    ));

    let bucket = BucketSettings::from_env().map_err(io::Error::other)?;
    info!(
        "🛡️ Rate Limiting 활성화 - bucket: {}, capacity: {}, refill: {}/{:?}",
        bucket.name, bucket.capacity, bucket.refill_tokens, bucket.refill_period
    );
    let gate = RateLimitMiddleware::new(
        Arc::new(DistributedRateLimiter::new(
            Arc::new(RedisBucketStore::new(redis.clone())),
            vec![bucket.clone()],
        )),
        bucket.name,
    );

    info!("✅ 모든 컴포넌트가 초기화되었습니다!");

    let served = start_http_server(repository, gate).await;

    info!("🛑 종료 중 - 소비 루프 취소, 마지막 커밋 대기");
    shutdown.cancel();
    for consumer in consumers {
        if let Err(e) = consumer.await {
            error!("소비 작업 종료 실패: {}", e);
        }
    }
    if let Err(e) = scheduler.await {
        error!("커밋 스케줄러 종료 실패: {}", e);
    }

    served
}

/// HTTP 서버를 구성하고 실행합니다
///
/// # Environment Variables
///
/// * `HOST`, `PORT` - 바인딩 주소 (기본값: 0.0.0.0:8080)
/// * `HTTP_WORKERS` - 워커 스레드 수 (기본값: 4)
async fn start_http_server(
    repository: web::Data<CredentialRepository>,
    gate: RateLimitMiddleware,
) -> io::Result<()> {
    let bind_address = format!("{}:{}", ServerConfig::host(), ServerConfig::port());

    info!("🌐 서버가 http://{} 에서 실행중입니다", bind_address);
    info!("📍 Health check: http://{}/health", bind_address);

    HttpServer::new(move || {
        let gate = gate.clone();
        App::new()
            .app_data(repository.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(|cfg| configure_all_routes(cfg, gate))
    })
    .bind(bind_address)?
    .workers(ServerConfig::workers())
    .run()
    .await
}

fn spawn_consumer(consumer: StreamConsumer, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = consumer.run(shutdown).await {
            error!("스트림 소비 루프 중단: {}", e);
        }
    })
}

/// 환경별 설정 파일을 로드합니다
///
/// * `PROFILE=dev` - .env.dev 파일 로드 (기본값)
/// * `PROFILE=prod` - .env.prod 파일 로드
/// * 기타 - 기본 .env 파일 로드
fn load_env_file() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "dev".to_string());

    info!("Current profile: {}", profile);

    match profile.as_str() {
        "prod" => match dotenv::from_filename(".env.prod") {
            Ok(_) => info!(".env.prod 파일 로드 됨"),
            Err(e) => error!(".env.prod 파일 로드 실패: {}", e),
        },
        "dev" => match dotenv::from_filename(".env.dev") {
            Ok(_) => info!(".env.dev 파일 로드 됨"),
            Err(e) => error!(".env.dev 파일 로드 실패: {}", e),
        },
        _ => {
            dotenv().ok();
            info!("기본 .env 파일 로드");
        }
    }
}

/// `RUST_LOG`가 없으면 `info,actix_web=debug`
fn init_logging() {
    env_logger::init_from_env(Env::default().default_filter_or("info,actix_web=debug"));
}

/// MongoDB와 Redis 연결을 초기화합니다
///
/// 둘 중 하나라도 연결할 수 없으면 기동을 중단합니다.
async fn initialize_data_stores() -> io::Result<(Database, RedisClient)> {
    info!("📡 데이터베이스 연결 중...");

    let database = Database::connect(&MongoSettings::from_env())
        .await
        .map_err(io::Error::other)?;

    let redis = RedisClient::connect(&RedisSettings::from_env())
        .await
        .map_err(io::Error::other)?;

    Ok((database, redis))
}
