use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use userd::{ServiceError, UserdConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug,userd=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = UserdConfig::from_env()?;
    let service = config.build().await?;

    let user_id = match service
        .create_user("Demo User", "demo@example.com", "demo", "demo-password")
        .await
    {
        Ok(user_id) => user_id,
        Err(e) if e.is_login_name_already_taken() || e.is_email_already_taken() => {
            tracing::info!("Demo user already exists");
            service.store().find_by_login_name("demo").await?.id
        }
        Err(e) => return Err(e.log().into()),
    };
    tracing::info!(user_id = %user_id, "Demo user ready");

    match service.authenticate("demo", "demo-password").await {
        Err(ServiceError::UserEmailMustBeVerified) => {
            tracing::info!("Login refused until the email is verified");
            service
                .check_and_set_email_verified(&user_id, "demo@example.com")
                .await?;
        }
        Err(e) => return Err(e.log().into()),
        Ok(_) => {}
    }

    let authenticated = service.authenticate("demo", "demo-password").await?;
    tracing::info!(user_id = %authenticated, "Authenticated");

    let token = service
        .new_reset_login_credentials_token("demo@example.com")
        .await?;
    let reset_id = service
        .reset_credentials_with_token(&token, "demo", "demo-password")
        .await?;
    tracing::info!(user_id = %reset_id, "Credentials reset with token");

    let user = service.get_user(&user_id).await?;
    tracing::info!(
        login_name = %user.login_name,
        email = %user.email,
        email_verified = user.email_verified,
        "Stored user"
    );
    Ok(())
}
