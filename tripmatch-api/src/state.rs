use tripmatch_match::TravelServices;
use tripmatch_store::app_config::TravelRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub travel: TravelServices,
    pub auth: AuthConfig,
    pub rules: TravelRules,
}
