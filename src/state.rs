use std::sync::Arc;

use crate::auth::identity::IdentityProvider;
use crate::config::Config;
use crate::db::Store;
use crate::models::IdGenerator;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub ids: IdGenerator,
}
