use crate::{
    cache::Cache,
    config::AppConfig,
    db::{DbPool, OrmConn},
    notify::Mailer,
    payments::PaymentClient,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub payments: PaymentClient,
    pub mailer: Mailer,
    pub cache: Cache,
    pub config: AppConfig,
}
