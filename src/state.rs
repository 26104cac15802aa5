use crate::config::Config;
use crate::db::Store;
use crate::email::Dispatcher;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub dispatcher: Arc<Dispatcher>,
    pub config: Arc<Config>,
}
