use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible bucket holding archived bank statements.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    /// Base URL used when building the email verification link.
    pub public_url: String,
    pub verify_ttl_minutes: i64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_minutes(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "flow"),
            audience: env_or("JWT_AUDIENCE", "flow-users"),
            ttl_minutes: env_minutes("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_minutes("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT")?,
            bucket: env_or("MINIO_BUCKET", "statements"),
            access_key: std::env::var("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")?,
            region: env_or("MINIO_REGION", "us-east-1"),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            public_url: env_or("APP_PUBLIC_URL", "http://localhost:8080"),
            verify_ttl_minutes: env_minutes("VERIFY_TTL_MINUTES", 60 * 24),
        })
    }

    pub fn verification_link(&self, token_hash: &str) -> String {
        format!(
            "{}/api/v1/auth/callback?token_hash={}&type=email",
            self.public_url.trim_end_matches('/'),
            token_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_verification_link() {
        let state = crate::state::AppState::fake();
        let link = state.config.verification_link("abc123");
        assert_eq!(
            link,
            "http://flow.test/api/v1/auth/callback?token_hash=abc123&type=email"
        );
    }
}
