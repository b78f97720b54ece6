use db::DBService;
use services::services::{auth::AuthService, realtime::RealtimeService};

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;

/// Shared handler state: persistence, the authentication boundary and the
/// in-process realtime hub.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    auth: AuthService,
    realtime: RealtimeService,
}

impl AppState {
    pub fn new(db: DBService, auth: AuthService, realtime: RealtimeService) -> Self {
        Self { db, auth, realtime }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn realtime(&self) -> &RealtimeService {
        &self.realtime
    }
}
