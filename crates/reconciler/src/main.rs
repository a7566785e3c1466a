/// CLUES Orchestrator Reconciler
///
/// 周期性执行电源管理生命周期，并提供节点开关机 REST API

use axum::{routing::get, Router};
use reconciler::{
    api,
    app_state::AppState,
    auth::{CredentialProvider, OAuthCredentials, StaticToken},
    clock::SystemClock,
    config::Config,
    db::{ensure_schema, establish_connection},
    monitoring::HttpMonitoringProvider,
    orchestrator::OrchestratorClient,
    services::PowerManager,
    store::{DbStore, StateStore},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let cfg = Config::from_env()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 CLUES Orchestrator Reconciler...");
    info!("✅ 配置加载成功，部署 {}", cfg.orchestrator.deployment_id);

    // 建立数据库连接并创建缺失的表
    let db = establish_connection(&cfg.database_url).await?;
    ensure_schema(&db).await?;
    let store: Arc<dyn StateStore> = Arc::new(DbStore::new(db));
    info!("✅ 数据库初始化成功");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    // 凭据：配置了 OAuth2 客户端时进行令牌交换，否则使用固定令牌
    let credentials: Arc<dyn CredentialProvider> = if cfg.auth.has_client() {
        let oauth = OAuthCredentials::new(&cfg.auth, http.clone(), store.clone())?;
        if let Err(e) = oauth.initialize().await {
            error!("获取 refresh token 失败: {}", e);
        }
        Arc::new(oauth)
    } else {
        Arc::new(StaticToken::new(cfg.auth.auth_data.clone()))
    };

    let orchestrator = Arc::new(OrchestratorClient::new(
        cfg.orchestrator.clone(),
        http.clone(),
        credentials.clone(),
    ));
    let monitoring = Arc::new(HttpMonitoringProvider::new(cfg.monitoring_url.clone(), http));

    let mut manager = PowerManager::new(
        cfg.reconciler.clone(),
        store,
        orchestrator,
        monitoring,
        credentials,
        Arc::new(SystemClock),
    );
    manager.restore().await;

    let app_state = AppState::new(manager);

    // 启动生命周期任务
    let lifecycle_manager = app_state.manager();
    let interval_secs = cfg.lifecycle_interval.max(1);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            lifecycle_manager.lock().await.run_pass().await;
        }
    });
    info!("✅ 生命周期任务已启动（每 {} 秒执行一次）", interval_secs);

    // 设置CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 构建应用路由
    let app = Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动服务器
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    info!("🎯 服务器监听在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> &'static str {
    "OK"
}
