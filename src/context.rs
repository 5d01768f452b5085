/// Shared application state
use crate::account::AccountManager;
use crate::config::ServerConfig;
use crate::db;
use crate::error::ApiResult;
use crate::intake::{InvestmentStore, NewsStore, QuestionnaireStore};
use crate::mailer::Mailer;
use crate::rate_limit::RateLimiters;
use crate::sms::SmsSender;
use crate::uploads::FileIntake;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub questionnaires: Arc<QuestionnaireStore>,
    pub investment: Arc<InvestmentStore>,
    pub news: Arc<NewsStore>,
    pub file_intake: Arc<FileIntake>,
    pub mailer: Arc<Mailer>,
    pub sms: Arc<SmsSender>,
    pub rate_limiters: Arc<RateLimiters>,
}

impl AppContext {
    /// Build the full application state: storage directories, database pool
    /// with migrations applied, and every service the handlers use.
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        tokio::fs::create_dir_all(&config.storage.upload_directory).await?;

        let pool = db::create_pool(&config.storage.database, Default::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;
        tracing::info!(database = %config.storage.database.display(), "database ready");

        let mailer = Arc::new(Mailer::new(&config)?);
        let sms = Arc::new(SmsSender::new(&config));
        let rate_limiters = Arc::new(RateLimiters::new(&config.rate_limit));
        let file_intake = Arc::new(FileIntake::new(config.storage.upload_directory.clone()));

        Ok(Self {
            accounts: Arc::new(AccountManager::new(pool.clone(), config.clone())),
            questionnaires: Arc::new(QuestionnaireStore::new(pool.clone())),
            investment: Arc::new(InvestmentStore::new(pool.clone())),
            news: Arc::new(NewsStore::new(pool.clone())),
            file_intake,
            mailer,
            sms,
            rate_limiters,
            db: pool,
            config,
        })
    }
}
