use std::collections::HashMap;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use serde::Deserialize;
use serde_json::json;

use crate::domain::{Decision, Error, Money, NotificationSink, RewardEvent, RewardStore};
use crate::engine::Engine;

/// HTTP-facing wrapper over the core error taxonomy. Business rejections
/// map to 4xx so upstream networks do not retry them; only store outages
/// get a 5xx that invites retry.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl core::fmt::Display for ApiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            Error::InvalidArgument(_) | Error::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            Error::DuplicateEvent { .. } | Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "code": self.0.code(),
            "error": self.0.to_string(),
        }))
    }
}

fn required(params: &HashMap<String, String>, name: &str) -> Result<String, ApiError> {
    params
        .get(name)
        .map(|v| v.to_string())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError(Error::invalid(format!("{} is required", name))))
}

/// Offer-network postback. Required: `player_id`, `transaction_id`,
/// `payout_decimal`. The full query map is captured verbatim on the
/// ledger row; the reporting IP falls back to the peer address.
async fn postback<S, N>(
    engine: web::Data<Engine<S, N>>,
    request: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, ApiError>
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    let params = query.into_inner();
    let user_id = required(&params, "player_id")?;
    let external_transaction_id = required(&params, "transaction_id")?;
    let payout_raw = required(&params, "payout_decimal")?;
    let payout = Money::from_decimal_str(&payout_raw).ok_or_else(|| {
        ApiError(Error::invalid(format!(
            "payout_decimal is not a valid decimal: {}",
            payout_raw
        )))
    })?;
    let source_ip = params
        .get("ip")
        .cloned()
        .or_else(|| request.peer_addr().map(|addr| addr.ip().to_string()));

    let event = RewardEvent {
        user_id,
        external_transaction_id,
        payout,
        currency_code: params.get("currency").cloned(),
        status: params.get("status").cloned(),
        program_id: params.get("program_id").cloned(),
        program_name: params.get("program_name").cloned(),
        goal_id: params.get("goal_id").cloned(),
        goal_name: params.get("goal_name").cloned(),
        country_code: params.get("country_code").cloned(),
        source_ip,
        raw_parameters: params,
    };

    let balance = engine.ingest_reward(event).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "balance": balance })))
}

#[derive(Debug, Deserialize)]
struct WithdrawBody {
    user_id: String,
    amount: Money,
    method: String,
    destination: String,
}

async fn request_withdrawal<S, N>(
    engine: web::Data<Engine<S, N>>,
    body: web::Json<WithdrawBody>,
) -> Result<HttpResponse, ApiError>
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    let body = body.into_inner();
    let request = engine
        .request_withdrawal(&body.user_id, body.amount, &body.method, &body.destination)
        .await?;
    Ok(HttpResponse::Created().json(json!({ "success": true, "request_id": request.id })))
}

#[derive(Debug, Deserialize)]
struct DecideBody {
    id: u64,
    status: String,
}

/// Admin decision endpoint. The wire keeps the legacy Spanish status
/// values the admin panel sends.
async fn decide_withdrawal<S, N>(
    engine: web::Data<Engine<S, N>>,
    body: web::Json<DecideBody>,
) -> Result<HttpResponse, ApiError>
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    let body = body.into_inner();
    let decision = match body.status.as_str() {
        "aprobado" => Decision::Approve,
        "rechazado" => Decision::Reject,
        other => {
            return Err(ApiError(Error::invalid(format!(
                "status must be 'aprobado' or 'rechazado', got '{}'",
                other
            ))));
        }
    };
    let decided = engine.decide_withdrawal(body.id, decision).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "request_id": decided.id,
        "status": decided.status,
    })))
}

#[derive(Debug, Deserialize)]
struct AdjustBody {
    user_id: String,
    amount: Money,
}

async fn adjust_balance<S, N>(
    engine: web::Data<Engine<S, N>>,
    body: web::Json<AdjustBody>,
) -> Result<HttpResponse, ApiError>
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    let body = body.into_inner();
    let balance = engine.adjust_balance(&body.user_id, body.amount).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "balance": balance })))
}

async fn reconcile<S, N>(engine: web::Data<Engine<S, N>>) -> Result<HttpResponse, ApiError>
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    let applied = engine.reconcile().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "applied": applied })))
}

async fn standing<S, N>(
    engine: web::Data<Engine<S, N>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError>
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    let user_id = path.into_inner();
    let standing = engine.standing_of(&user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "user_id": user_id,
        "balance": standing.balance,
        "tier": standing.tier.level(),
        "commission_rate": standing.commission_rate,
        "next_threshold": standing.next_threshold,
    })))
}

async fn reward_history<S, N>(
    engine: web::Data<Engine<S, N>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError>
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    let user_id = path.into_inner();
    let entries = engine.history_of(&user_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

pub fn configure<S, N>(cfg: &mut web::ServiceConfig)
where
    S: RewardStore + 'static,
    N: NotificationSink + 'static,
{
    cfg.route("/postback", web::get().to(postback::<S, N>))
        .route("/postback", web::post().to(postback::<S, N>))
        .route("/withdrawals", web::post().to(request_withdrawal::<S, N>))
        .route(
            "/admin/withdrawals/decide",
            web::post().to(decide_withdrawal::<S, N>),
        )
        .route("/admin/balance", web::post().to(adjust_balance::<S, N>))
        .route("/admin/reconcile", web::post().to(reconcile::<S, N>))
        .route("/users/{user_id}/standing", web::get().to(standing::<S, N>))
        .route(
            "/users/{user_id}/rewards",
            web::get().to(reward_history::<S, N>),
        );
}
