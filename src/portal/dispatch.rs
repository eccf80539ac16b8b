//! Route dispatch and `/save` handling.
//!
//! # Routes
//! - `/save*` with parameters and a matching session → persist, stop portal;
//!   POST reads the body, GET only a query directly after `/save?`
//! - `/save` with a missing or wrong session → form, nothing mutated
//! - anything else (or `/save` without parameters) → form

use crate::config::{ConfigStore, DeviceConfig};
use crate::http::form::{param, parse_int};
use crate::http::request::{InboundRequest, Method};
use crate::portal::page::render_form;
use crate::portal::session::SessionToken;

pub const SAVE_PATH: &str = "/save";

/// How a request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Form shown unchanged.
    Form,
    /// Submission persisted.
    Saved,
    /// Session token missing or wrong.
    Rejected,
    /// Submission valid but persisting it failed.
    SaveFailed,
    /// Request could not be parsed.
    Invalid,
}

impl Route {
    pub fn label(self) -> &'static str {
        match self {
            Route::Form => "form",
            Route::Saved => "saved",
            Route::Rejected => "rejected",
            Route::SaveFailed => "save_failed",
            Route::Invalid => "invalid",
        }
    }
}

/// Page to send back and whether the portal should stop afterwards.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub page: String,
    pub route: Route,
    pub stop_after_response: bool,
}

impl DispatchOutcome {
    fn form(config: &DeviceConfig, session: &SessionToken, route: Route) -> Self {
        Self {
            page: render_form(config, session, false),
            route,
            stop_after_response: false,
        }
    }
}

/// Handle one parsed request against the current configuration.
///
/// `config` is only replaced after the submission has been persisted.
pub fn dispatch<S: ConfigStore>(
    request: &InboundRequest,
    config: &mut DeviceConfig,
    store: &mut S,
    session: &SessionToken,
) -> DispatchOutcome {
    if !request.path().starts_with(SAVE_PATH) {
        return DispatchOutcome::form(config, session, Route::Form);
    }

    let params = match request.method {
        Method::Post => request.body.as_str(),
        Method::Get => request
            .target
            .strip_prefix(SAVE_PATH)
            .and_then(|rest| rest.strip_prefix('?'))
            .unwrap_or(""),
        Method::Other(_) => "",
    };
    if params.is_empty() {
        return DispatchOutcome::form(config, session, Route::Form);
    }

    if !session.matches(&param(params, "session")) {
        tracing::warn!("Rejected /save with invalid session token");
        return DispatchOutcome::form(config, session, Route::Rejected);
    }

    let candidate = apply_submission(params);
    if let Err(e) = store.save(&candidate.to_record()) {
        tracing::error!(error = %e, "Failed to persist submitted configuration");
        return DispatchOutcome::form(config, session, Route::SaveFailed);
    }
    *config = candidate;

    if let Err(e) = store.set_configured(true) {
        tracing::error!(error = %e, "Failed to mark device as configured");
        return DispatchOutcome::form(config, session, Route::SaveFailed);
    }

    tracing::info!(
        module_name = %config.module_name,
        upload_url = %config.upload_url,
        interval_ms = config.capture_interval_ms,
        "Configuration saved"
    );

    DispatchOutcome {
        page: render_form(config, session, true),
        route: Route::Saved,
        stop_after_response: true,
    }
}

/// Build the configuration described by a form submission.
///
/// Absent text fields become empty and absent numbers become 0.
pub fn apply_submission(params: &str) -> DeviceConfig {
    DeviceConfig {
        module_name: param(params, "module_name"),
        ssid: param(params, "ssid"),
        password: param(params, "password"),
        upload_url: join_url(&param(params, "upload_base"), &param(params, "upload_endpoint")),
        init_url: join_url(&param(params, "init_base"), &param(params, "init_endpoint")),
        capture_interval_ms: int_param(params, "interval"),
        resolution: param(params, "res"),
        vertical_flip: int_param(params, "vflip"),
        brightness: int_param(params, "bright"),
        saturation: int_param(params, "sat"),
    }
}

fn int_param(params: &str, name: &str) -> i32 {
    let value = parse_int(&param(params, name));
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Join a base URL and an endpoint with one `/`, after dropping one
/// trailing `/` from the base and one leading `/` from the endpoint.
pub fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim();
    let endpoint = endpoint.trim();
    let base = base.strip_suffix('/').unwrap_or(base);
    let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);

    if !base.is_empty() && !endpoint.is_empty() {
        format!("{}/{}", base, endpoint)
    } else {
        base.to_string()
    }
}
