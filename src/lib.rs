pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod github;
pub mod notifications;
pub mod sync;

pub use db::DbPool;

use auth::SessionSigner;
use config::Config;
use crypto::TokenCipher;
use notifications::Mailer;
use sync::EventSynchronizer;

/// Shared application state, constructed once and passed by `Arc`.
///
/// The only cached cryptographic material lives here: the derived AES key
/// inside the cipher and the session signing keys. Both are derived from the
/// server secret at startup and shared read-only across requests.
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub cipher: TokenCipher,
    pub sessions: SessionSigner,
    pub sync: EventSynchronizer,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let cipher = TokenCipher::from_secret(config.server_secret());
        let sessions = SessionSigner::new(config.server_secret(), config.auth.session_ttl_days);
        let sync = EventSynchronizer::new(db.clone());
        let mailer = Mailer::new(config.email.clone());

        Self {
            config,
            db,
            cipher,
            sessions,
            sync,
            mailer,
        }
    }
}
