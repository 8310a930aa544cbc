use anyhow::Context;

use classbook_auth::{NewUser, UserRole};
use classbook_infra::AppConfig;

use classbook_api::app::{AppServices, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    classbook_observability::init(&config.observability);

    if config.auth.jwt_secret == AppConfig::default().auth.jwt_secret {
        tracing::warn!("auth.jwt_secret not set; using insecure dev default");
    }

    let services = AppServices::from_config(&config).await?;

    if let Some(admin) = &config.auth.bootstrap_admin {
        let input = NewUser {
            email: admin.email.clone(),
            name: admin.name.clone(),
            password: admin.password.clone(),
            role: UserRole::Admin,
        };
        if let Some(user) = services.accounts.ensure_admin(input).await? {
            tracing::info!(user_id = %user.id, "bootstrap administrator created");
        }
    }

    let app = build_app(services);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
