//! Shared application state

use consulta_services::Services;

/// State handed to every handler through `web::Data`
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }
}
