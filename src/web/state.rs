//! Application state (§9 "Global state"): the admin token and database
//! handle are explicit construction parameters of the server object rather
//! than ambient globals, so tests can instantiate isolated servers.

use crate::web::dispatch::Dispatcher;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub admin_token: Arc<str>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: SqlitePool, admin_token: String) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(pool.clone())),
            pool,
            admin_token: Arc::from(admin_token.as_str()),
        }
    }
}
