use std::convert::Infallible;
use std::sync::MutexGuard;

use bytes::Bytes;
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt as _, Full, LengthLimitError, Limited};
use serde::Serialize;

use crate::command::{Command, CommandResponse};
use crate::error::AppError;
use crate::{App, SharedApp};

/// Largest accepted command body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Entry point for every request. Errors are rendered here so the connection never sees one.
pub async fn handle<B>(
    app: SharedApp,
    request: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = match route(&app, request).await {
        Ok(response) => response,
        Err(error) => {
            tracing::debug!(%method, %path, %error, "request rejected");
            error.into_response()
        }
    };
    Ok(response)
}

async fn route<B>(app: &SharedApp, request: Request<B>) -> Result<Response<Full<Bytes>>, AppError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match (request.method(), request.uri().path()) {
        (&Method::GET, "/state") => state(app),
        (&Method::POST, "/commands") => {
            let body = read_body(request.into_body()).await?;
            let command: Command =
                serde_json::from_slice(&body).map_err(AppError::InvalidCommand)?;
            execute(app, command)
        }
        (_, "/state" | "/commands") => Err(AppError::MethodNotAllowed),
        _ => Err(AppError::NotFound),
    }
}

async fn read_body<B>(body: B) -> Result<Bytes, AppError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(error) if error.is::<LengthLimitError>() => Err(AppError::BodyTooLarge {
            limit: MAX_BODY_BYTES,
        }),
        Err(error) => Err(AppError::Body(error.to_string())),
    }
}

fn lock(app: &SharedApp) -> Result<MutexGuard<'_, App>, AppError> {
    app.lock().map_err(|_| AppError::Poison)
}

fn state(app: &SharedApp) -> Result<Response<Full<Bytes>>, AppError> {
    let app = lock(app)?;
    json_response(app.state())
}

fn execute(app: &SharedApp, command: Command) -> Result<Response<Full<Bytes>>, AppError> {
    let mut app = lock(app)?;
    let report = app.execute(command);
    json_response(&CommandResponse {
        report: &report,
        state: app.state(),
    })
}

fn json_response<T: Serialize + ?Sized>(value: &T) -> Result<Response<Full<Bytes>>, AppError> {
    let body = serde_json::to_vec(value)?;
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(Full::new(Bytes::from(body)))?)
}
