//! Shared application state for all routes.

use crate::service::Service;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct AppState {
    pub service: Arc<Service>,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }
}
