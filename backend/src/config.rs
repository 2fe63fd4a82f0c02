use anyhow::Context;

use crate::notify::RecipientPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub listen_addr: String,
    pub cors_origins: Vec<String>,
    pub notify_recipients: RecipientPolicy,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters for security");
        }
        if jwt_secret.contains("change_me") {
            anyhow::bail!("JWT_SECRET contains a placeholder value, set a real secret before running");
        }

        Ok(Self {
            database_url: database_url()?,
            jwt_secret,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "12".into())
                .parse()
                .context("JWT_EXPIRY_HOURS must be a number")?,
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            notify_recipients: recipient_policy(
                &std::env::var("NOTIFY_RECIPIENTS").unwrap_or_else(|_| "assignee".into()),
            )?,
            log_json: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        })
    }
}

fn recipient_policy(raw: &str) -> anyhow::Result<RecipientPolicy> {
    raw.parse::<RecipientPolicy>()
        .context("NOTIFY_RECIPIENTS is invalid")
}

pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").context("DATABASE_URL must be set")
}

/// Settings for the one-shot deployment provisioning step.
#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub org_name: String,
    pub org_slug: String,
    pub org_timezone: String,
    pub admin_email: String,
    pub admin_password: String,
    pub admin_name: Option<String>,
}

impl BootstrapConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let org_timezone =
            std::env::var("BOOTSTRAP_ORG_TIMEZONE").unwrap_or_else(|_| "UTC".into());
        org_timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("BOOTSTRAP_ORG_TIMEZONE is not a known timezone: {}", e))?;

        let admin_password = std::env::var("BOOTSTRAP_ADMIN_PASSWORD")
            .context("BOOTSTRAP_ADMIN_PASSWORD must be set")?;
        if admin_password.len() < 8 {
            anyhow::bail!("BOOTSTRAP_ADMIN_PASSWORD must be at least 8 characters");
        }

        Ok(Self {
            org_name: std::env::var("BOOTSTRAP_ORG_NAME").context("BOOTSTRAP_ORG_NAME must be set")?,
            org_slug: std::env::var("BOOTSTRAP_ORG_SLUG").context("BOOTSTRAP_ORG_SLUG must be set")?,
            org_timezone,
            admin_email: std::env::var("BOOTSTRAP_ADMIN_EMAIL")
                .context("BOOTSTRAP_ADMIN_EMAIL must be set")?,
            admin_password,
            admin_name: std::env::var("BOOTSTRAP_ADMIN_NAME").ok(),
        })
    }
}
