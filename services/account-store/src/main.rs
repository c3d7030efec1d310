//! account-store - 账户查看工具
//!
//! 用法：`account-store <identifier>...`，逐个输出账户的凭证、角色与权限。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::{error, info};
use warden_adapter_postgres::{PostgresConfig, check_connection, create_pool};
use warden_config::{AppConfig, LogFormat, SETTINGS_ENV_VAR};
use warden_errors::{AppError, AppResult};

use account_store::{DefaultAccountStore, MIGRATOR, PostgresUnitOfWorkFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = if std::env::var_os(SETTINGS_ENV_VAR).is_some() {
        AppConfig::load_from_env()?
    } else {
        AppConfig::load("config")?
    };

    match config.telemetry.format {
        LogFormat::Json => warden_telemetry::init_tracing_json(&config.telemetry.log_level),
        LogFormat::Pretty => warden_telemetry::init_tracing(&config.telemetry.log_level),
    }
    info!(app = %config.app_name, env = %config.app_env, "Starting account store");

    let url = config.database.connection_url()?;
    let pg_config = PostgresConfig::new(url.expose_secret().as_str())
        .with_max_connections(config.database.max_connections)
        .with_acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs));
    let pool = create_pool(&pg_config).await?;
    check_connection(&pool).await?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to run migrations: {}", e)))?;
    info!("Migrations applied");

    let uow_factory = Arc::new(PostgresUnitOfWorkFactory::new(pool.clone()));
    let store = DefaultAccountStore::with_default_resolvers(uow_factory)
        .with_settings(&config.account_store);

    let identifiers: Vec<String> = std::env::args().skip(1).collect();
    if identifiers.is_empty() {
        info!("No identifiers given, nothing to show");
    }
    for identifier in &identifiers {
        if let Err(e) = describe(&store, identifier).await {
            error!(identifier = %identifier, kind = e.kind(), error = %e, "Account lookup failed");
        }
    }

    pool.close().await;
    Ok(())
}

async fn describe(store: &DefaultAccountStore, identifier: &str) -> AppResult<()> {
    let Some(account) = store.get_account(identifier).await? else {
        println!("{}: not found", identifier);
        return Ok(());
    };

    println!("{}", identifier);
    if let Some(auth) = &account.authentication {
        let now = Utc::now();
        let mut kinds: Vec<String> = auth
            .credentials
            .iter()
            .flat_map(|(kind, credentials)| {
                credentials.iter().map(move |c| {
                    if c.is_expired(now) {
                        format!("{} (expired)", kind)
                    } else {
                        kind.to_string()
                    }
                })
            })
            .collect();
        kinds.sort();
        println!("  credentials: {}", kinds.join(", "));
        match auth.locked_at {
            Some(locked_at) => println!("  locked at:   {}", locked_at.to_rfc3339()),
            None => println!("  locked at:   -"),
        }
        if let Some(phone) = &auth.phone_number {
            println!("  phone:       {}", phone);
        }
    }
    if let Some(roles) = &account.roles {
        let mut titles: Vec<&str> = roles.iter().map(|r| r.title.as_str()).collect();
        titles.sort_unstable();
        println!("  roles:       {}", titles.join(", "));
    }
    if let Some(permissions) = &account.permissions {
        let mut descriptors: Vec<String> = permissions
            .values()
            .flatten()
            .map(ToString::to_string)
            .collect();
        descriptors.sort();
        println!("  permissions:");
        for descriptor in descriptors {
            println!("    {}", descriptor);
        }
    }
    Ok(())
}
