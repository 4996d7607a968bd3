use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub payment: PaymentConfig,
    pub smtp: Option<SmtpConfig>,
}

/// Hosted payment gateway settings.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub api_base: String,
    pub secret_key: String,
    pub webhook_secret: String,
    /// Smallest total the provider will charge, in minor units.
    pub minimum_charge: i64,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")?;

        let payment = PaymentConfig {
            api_base: env::var("PAYMENT_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            secret_key: env::var("PAYMENT_SECRET_KEY")?,
            webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET")?,
            minimum_charge: env::var("PAYMENT_MINIMUM_CHARGE")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(50),
            success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/success".to_string()),
            cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:3000/cart".to_string()),
        };

        // Email is optional; without SMTP settings the mailer runs disabled.
        let smtp = match (
            env::var("SMTP_HOST"),
            env::var("SMTP_USERNAME"),
            env::var("SMTP_PASSWORD"),
        ) {
            (Ok(host), Ok(username), Ok(password)) => Some(SmtpConfig {
                host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(587),
                username,
                password,
                from_address: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "orders@marketplace.local".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            payment,
            smtp,
        })
    }
}
