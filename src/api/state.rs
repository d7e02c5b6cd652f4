use std::sync::Arc;

use super::auth::AdminAuth;
use crate::db::Database;
use crate::deposit::{AdminSurface, DepositPoller, LifecycleEngine};
use crate::verifier::VerifierSet;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    pub poller: Arc<DepositPoller>,
    pub admin: Arc<AdminSurface>,
    pub verifiers: Arc<VerifierSet>,
    pub admin_auth: Arc<AdminAuth>,
    /// PostgreSQL pool, when the service runs on the durable store
    pub pg_db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(
        engine: Arc<LifecycleEngine>,
        verifiers: Arc<VerifierSet>,
        admin_auth: AdminAuth,
        pg_db: Option<Arc<Database>>,
    ) -> Self {
        Self {
            poller: Arc::new(DepositPoller::new(engine.clone())),
            admin: Arc::new(AdminSurface::new(engine.clone())),
            engine,
            verifiers,
            admin_auth: Arc::new(admin_auth),
            pg_db,
        }
    }
}
