use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryConfig {
    pub token_ttl_minutes: i64,
    pub frontend_url: String,
}

/// Transactional email API settings. Without an api key mail is only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub sender_email: String,
    pub sender_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub recovery: RecoveryConfig,
    pub mail: MailConfig,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "todolist".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "todolist-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES").unwrap_or(60 * 24 * 7),
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");
        check_ttl("JWT_TTL_MINUTES", jwt.ttl_minutes)?;

        let recovery = RecoveryConfig {
            token_ttl_minutes: env_i64("RESET_TOKEN_TTL_MINUTES").unwrap_or(60),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
        };
        check_ttl("RESET_TOKEN_TTL_MINUTES", recovery.token_ttl_minutes)?;

        let mail = MailConfig {
            api_url: std::env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.brevo.com/v3/smtp/email".into()),
            api_key: std::env::var("MAIL_API_KEY").ok().filter(|k| !k.is_empty()),
            sender_email: std::env::var("MAIL_SENDER_EMAIL")
                .unwrap_or_else(|_| "no-reply@todolist.local".into()),
            sender_name: std::env::var("MAIL_SENDER_NAME").unwrap_or_else(|_| "To-Do List".into()),
        };

        let cors_origins = parse_origins(&std::env::var("CORS_ORIGINS").unwrap_or_default());

        Ok(Self {
            database_url,
            jwt,
            recovery,
            mail,
            cors_origins,
        })
    }
}

/// One year.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

fn check_ttl(key: &str, minutes: i64) -> anyhow::Result<()> {
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "{key} must be between 1 and {MAX_TTL_MINUTES} minutes, got {minutes}"
    );
    Ok(())
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}

/// Splits a comma separated origin list. An empty result means "allow any".
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty() && *o != "*")
        .map(str::to_string)
        .collect()
}
