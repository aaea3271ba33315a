//! Route registration table
//!
//! Every endpoint is one [`RouteEntry`]: its path, its access level and the
//! handler. The access level travels with the resource as app data and is
//! enforced by the `AuthenticatedUser` extractor.

use crate::handlers::{balance, call, earnings, health, matching, payment, referral, withdrawal};
use actix_web::{error::JsonPayloadError, web, HttpRequest};
use consulta_auth::Access;
use consulta_core::models::Permission;
use consulta_core::AppError;
use tracing::warn;

/// Upper bound on JSON request bodies
const JSON_LIMIT_BYTES: usize = 64 * 1024;

/// One registered endpoint
pub struct RouteEntry {
    pub path: &'static str,
    pub access: Access,
    pub route: fn() -> actix_web::Route,
}

fn entry(path: &'static str, access: Access, route: fn() -> actix_web::Route) -> RouteEntry {
    RouteEntry {
        path,
        access,
        route,
    }
}

/// All `/api/v1` endpoints
pub fn table() -> Vec<RouteEntry> {
    use Access::*;

    vec![
        entry("/health", Public, || web::get().to(health::health_check)),
        // Calls
        entry("/calls", Authenticated, || web::post().to(call::create_call)),
        entry("/calls/{id}/connecting", Authenticated, || {
            web::post().to(call::mark_connecting)
        }),
        entry("/calls/{id}/activate", Authenticated, || {
            web::post().to(call::activate_call)
        }),
        entry("/calls/{id}/end", Authenticated, || web::post().to(call::end_call)),
        entry("/calls/{id}/cancel", Authenticated, || {
            web::post().to(call::cancel_call)
        }),
        entry("/calls/{id}/settlement", Authenticated, || {
            web::get().to(call::get_settlement)
        }),
        // Payments
        entry("/payments/webhook", Signed, || {
            web::post().to(payment::payment_webhook)
        }),
        // Balances
        entry("/balances/{user_id}", Authenticated, || {
            web::get().to(balance::get_balance)
        }),
        entry("/balances/{user_id}/history", Authenticated, || {
            web::get().to(balance::get_history)
        }),
        // Withdrawals
        entry("/withdrawals", Authenticated, || {
            web::post().to(withdrawal::request_withdrawal)
        }),
        entry(
            "/withdrawals/{id}/approve",
            Requires(Permission::ManagePayouts),
            || web::post().to(withdrawal::approve_withdrawal),
        ),
        entry(
            "/withdrawals/{id}/reject",
            Requires(Permission::ManagePayouts),
            || web::post().to(withdrawal::reject_withdrawal),
        ),
        // Referrals
        entry("/referrals", Authenticated, || {
            web::post().to(referral::create_referral)
        }),
        entry(
            "/referrals/{id}/status",
            Requires(Permission::ModerateReferrals),
            || web::put().to(referral::set_referral_status),
        ),
        entry("/referrals/earnings/{referrer_id}", Authenticated, || {
            web::get().to(referral::referral_earnings)
        }),
        // Earnings
        entry("/earnings/{payee_id}", Authenticated, || {
            web::get().to(earnings::get_earnings)
        }),
        // Matching
        entry("/matching/presence", Authenticated, || {
            web::post().to(matching::set_presence)
        }),
        entry("/matching/match", Authenticated, || {
            web::post().to(matching::find_match)
        }),
    ]
}

/// Malformed JSON answers with the standard error body
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected JSON payload: {}", err);
    AppError::InvalidInput(err.to_string()).into()
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(json_error_handler)
}

/// Register the route table under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    let mut scope = web::scope("/api/v1");
    for route in table() {
        scope = scope.service(
            web::resource(route.path)
                .app_data(route.access)
                .route((route.route)()),
        );
    }

    cfg.app_data(json_config()).service(scope);
}
