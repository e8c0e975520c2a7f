use crate::errors::AppError;
use crate::gate::{Flash, SessionContext, session_cookie_value};
use crate::mailer::{ForwardError, Upload};
use crate::models::{
    EntryRequest, ForwardResponse, GateStatus, SubmitResponse, TableResponse, UnlockRequest,
};
use crate::reconciler::SubmitError;
use crate::record::{EntryDraft, FormCatalog, now_local};
use crate::state::AppState;
use crate::ui::{render_entry_page, render_gate_page};
use axum::{
    Form, Json,
    extract::{Multipart, State},
    http::{
        HeaderMap, HeaderName, StatusCode,
        header::{COOKIE, SET_COOKIE},
    },
    response::{AppendHeaders, Html, Redirect},
};
use chrono::Local;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

type SetCookie = AppendHeaders<[(HeaderName, String); 1]>;

#[derive(Debug, Deserialize)]
pub struct UnlockForm {
    pub password: String,
}

pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (SetCookie, Html<String>) {
    let mut session = load_session(&state, &headers).await;
    let flash = session.flash.take();
    if flash.is_some() {
        state.sessions.save(&session).await;
    }

    let page = if session.unlocked {
        render_entry_page(
            &state.catalog,
            flash.as_ref(),
            Local::now().date_naive(),
            state.forwarder.is_some(),
        )
    } else {
        render_gate_page(&state.catalog.title, flash.as_ref())
    };
    (set_cookie(&session), Html(page))
}

pub async fn unlock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<UnlockForm>,
) -> (SetCookie, Redirect) {
    let mut session = load_session(&state, &headers).await;
    apply_password(&state, &mut session, form.password).await;
    (set_cookie(&session), Redirect::to("/"))
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(fields): Form<BTreeMap<String, String>>,
) -> Result<(SetCookie, Redirect), AppError> {
    let mut session = load_session(&state, &headers).await;
    if !session.unlocked {
        return Ok((set_cookie(&session), Redirect::to("/")));
    }

    let outcome = match EntryDraft::from_form(&state.catalog, fields) {
        Ok(draft) => submit_draft(&state, draft).await,
        Err(err) => Err(err.into()),
    };
    let flash = match outcome {
        Ok(response) => Flash::success(format!("Success! Data for {} saved.", response.company)),
        Err(SubmitError::Validation(err)) => Flash::error(err.to_string()),
        Err(SubmitError::Conflict) => {
            Flash::error("Another entry was saved at the same time. Please submit again.")
        }
        Err(err @ SubmitError::Store(_)) => return Err(err.into()),
    };

    session.flash = Some(flash);
    state.sessions.save(&session).await;
    Ok((set_cookie(&session), Redirect::to("/")))
}

pub async fn forward(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(SetCookie, Redirect), AppError> {
    let mut session = load_session(&state, &headers).await;
    if !session.unlocked {
        return Ok((set_cookie(&session), Redirect::to("/")));
    }

    let flash = match forward_upload(&state, multipart).await {
        Ok(_) => Flash::success("File sent to the administrator."),
        Err(ForwardRejection::Disabled) => Flash::error("Email forwarding is not configured."),
        Err(ForwardRejection::BadUpload(err)) => Flash::error(err.message),
        Err(ForwardRejection::Failed(ForwardError::MissingFile)) => {
            Flash::error("Please choose a file to send.")
        }
        Err(ForwardRejection::Failed(err)) => Flash::error(format!("Failed to send email: {err}")),
    };

    session.flash = Some(flash);
    state.sessions.save(&session).await;
    Ok((set_cookie(&session), Redirect::to("/")))
}

pub async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> Json<GateStatus> {
    let session = load_session(&state, &headers).await;
    Json(GateStatus {
        unlocked: session.unlocked,
    })
}

pub async fn api_unlock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UnlockRequest>,
) -> (SetCookie, Result<Json<GateStatus>, AppError>) {
    let mut session = load_session(&state, &headers).await;
    let result = if apply_password(&state, &mut session, payload.password).await {
        Ok(Json(GateStatus { unlocked: true }))
    } else {
        Err(AppError::new(StatusCode::UNAUTHORIZED, "Password incorrect"))
    };
    (set_cookie(&session), result)
}

pub async fn get_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FormCatalog>, AppError> {
    require_unlocked(&state, &headers).await?;
    Ok(Json(state.catalog.as_ref().clone()))
}

pub async fn get_entries(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TableResponse>, AppError> {
    require_unlocked(&state, &headers).await?;
    let table = state.reconciler.current_table().await?;
    Ok(Json(table.into()))
}

pub async fn post_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<EntryRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    require_unlocked(&state, &headers).await?;
    let response = submit_draft(&state, payload.into()).await?;
    Ok(Json(response))
}

pub async fn api_forward(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ForwardResponse>, AppError> {
    require_unlocked(&state, &headers).await?;
    match forward_upload(&state, multipart).await {
        Ok(response) => Ok(Json(response)),
        Err(ForwardRejection::Disabled) => Err(AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "email forwarding is not configured",
        )),
        Err(ForwardRejection::BadUpload(err)) => Err(err),
        Err(ForwardRejection::Failed(err)) => Err(err.into()),
    }
}

async fn load_session(state: &AppState, headers: &HeaderMap) -> SessionContext {
    let cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_cookie_value);
    state.sessions.load(cookie).await
}

async fn require_unlocked(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if load_session(state, headers).await.unlocked {
        Ok(())
    } else {
        Err(AppError::unauthorized())
    }
}

fn set_cookie(session: &SessionContext) -> SetCookie {
    AppendHeaders([(SET_COOKIE, session.cookie())])
}

async fn apply_password(state: &AppState, session: &mut SessionContext, entered: String) -> bool {
    let granted = state.gate.unlock(session, entered);
    if granted {
        info!(session = %session.id, "session unlocked");
    } else {
        info!(session = %session.id, "incorrect password entered");
    }
    state.sessions.save(session).await;
    granted
}

async fn submit_draft(state: &AppState, draft: EntryDraft) -> Result<SubmitResponse, SubmitError> {
    let record = draft.into_record(&state.catalog, now_local())?;
    let outcome = state.reconciler.submit(&record).await?;
    Ok(SubmitResponse {
        company: record.company,
        rows: outcome.rows,
    })
}

enum ForwardRejection {
    Disabled,
    BadUpload(AppError),
    Failed(ForwardError),
}

async fn forward_upload(
    state: &AppState,
    multipart: Multipart,
) -> Result<ForwardResponse, ForwardRejection> {
    let Some(forwarder) = state.forwarder.as_ref() else {
        return Err(ForwardRejection::Disabled);
    };
    let upload = read_upload(multipart)
        .await
        .map_err(ForwardRejection::BadUpload)?;
    let filename = upload.filename.clone();
    let bytes = upload.bytes.len();

    forwarder
        .forward(upload)
        .await
        .map_err(ForwardRejection::Failed)?;
    Ok(ForwardResponse {
        sent: true,
        filename,
        bytes,
    })
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut upload = Upload {
        filename: String::new(),
        bytes: Vec::new(),
        note: String::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("file") => {
                upload.filename = field.file_name().unwrap_or_default().to_string();
                upload.bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(err.to_string()))?
                    .to_vec();
            }
            Some("note") => {
                upload.note = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(err.to_string()))?;
            }
            _ => {}
        }
    }

    Ok(upload)
}
