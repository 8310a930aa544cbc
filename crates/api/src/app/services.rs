//! Service wiring: picks the entity store and builds every application
//! service over one shared context.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use classbook_auth::{PasswordPolicy, TokenService};
use classbook_booking::BookingPolicy;
use classbook_core::{Clock, SystemClock};
use classbook_infra::store::{EntityStore, InMemoryStore, PostgresStore};
use classbook_infra::{
    AccountService, AppConfig, AuditSink, BookingEngine, ClassCatalog, ServiceContext,
    SessionScheduler, StatisticsService, TracingAuditSink,
};

/// Everything a handler may call.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub engine: BookingEngine,
    pub scheduler: SessionScheduler,
    pub stats: StatisticsService,
    pub accounts: AccountService,
    pub catalog: ClassCatalog,
    ctx: ServiceContext,
}

impl AppServices {
    pub fn new(ctx: ServiceContext, config: &AppConfig) -> Self {
        let policy = BookingPolicy::from(&config.booking);
        let tokens = TokenService::new(config.auth.jwt_secret.as_bytes(), config.token_ttl());
        Self {
            engine: BookingEngine::new(ctx.clone(), policy),
            scheduler: SessionScheduler::new(ctx.clone(), policy),
            stats: StatisticsService::new(ctx.clone()),
            accounts: AccountService::new(ctx.clone(), PasswordPolicy::from(&config.auth), tokens),
            catalog: ClassCatalog::new(ctx.clone()),
            ctx,
        }
    }

    /// Wall clock and tracing audit sink over the given store.
    pub fn with_store(store: Arc<dyn EntityStore>, config: &AppConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
        Self::new(ServiceContext::new(store, clock, audit), config)
    }

    /// Store chosen by `database.use_postgres`; Postgres is migrated on start.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn EntityStore> = if config.database.use_postgres {
            let store =
                PostgresStore::connect(&config.database.url, config.database.max_connections)
                    .await?;
            store.migrate().await?;
            tracing::info!(max_connections = config.database.max_connections, "using postgres store");
            Arc::new(store)
        } else {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(InMemoryStore::new())
        };
        Ok(Self::with_store(store, config))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.clock().now()
    }

    /// Whether a store transaction can be opened and committed.
    pub async fn store_healthy(&self) -> bool {
        match self.ctx.store().begin().await {
            Ok(tx) => tx.commit().await.is_ok(),
            Err(e) => {
                tracing::error!(error = %e, "health check failed");
                false
            }
        }
    }
}
