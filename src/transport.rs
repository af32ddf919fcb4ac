//! Line-delimited JSON transport.
//!
//! Each input line is one request; each request produces exactly one output
//! line. Two request shapes are accepted:
//!
//! - `{"sql": "...", "advanced": false, "submit": false}` validates raw SQL.
//!   With `advanced` the response carries length, line count and a
//!   timestamp. With `submit` a valid query is passed to the executor.
//! - Any other object is read as a [`StructuredQuery`] and built.
//!
//! Failures are reported in-band as `{"error": true, "message": ...}`.

use crate::error::QueryError;
use crate::gateway::{QueryExecutor, QueryGateway};
use crate::query::StructuredQuery;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// A raw SQL request.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlRequest {
    pub sql: String,

    #[serde(default)]
    pub advanced: bool,

    #[serde(default)]
    pub submit: bool,
}

/// A decoded request line.
#[derive(Debug, Clone)]
pub enum Request {
    Sql(SqlRequest),
    Structured(StructuredQuery),
}

impl Request {
    /// Decode one request line.
    ///
    /// The descriptor is decoded from the text itself so filters keep the
    /// order they were written in.
    pub fn parse(line: &str) -> Result<Self, QueryError> {
        let value: Value = serde_json::from_str(line)?;
        if !value.is_object() {
            return Err(QueryError::invalid_argument("Request must be a JSON object"));
        }

        if value.get("sql").is_some() {
            Ok(Request::Sql(serde_json::from_value(value)?))
        } else {
            Ok(Request::Structured(serde_json::from_str(line)?))
        }
    }
}

/// Build the in-band error payload.
pub fn error_response(error: &QueryError) -> Value {
    json!({
        "error": true,
        "message": error.to_string(),
        "suggestion": error.suggestion(),
        "timestamp": Utc::now(),
    })
}

fn to_response<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!("Failed to serialize response: {}", e);
        error_response(&QueryError::internal(format!(
            "Failed to serialize response: {}",
            e
        )))
    })
}

/// Handle a single request line.
pub async fn handle_line<E>(gateway: &QueryGateway<E>, line: &str) -> Value
where
    E: QueryExecutor,
    E::Output: Serialize,
{
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed request: {}", e);
            return error_response(&e);
        }
    };

    match request {
        Request::Sql(req) if req.submit => match gateway.run_sql(&req.sql).await {
            Ok(output) => to_response(&output),
            Err(e) => error_response(&e),
        },
        Request::Sql(req) if req.advanced => to_response(&gateway.report(&req.sql)),
        Request::Sql(req) => to_response(&gateway.validate(&req.sql)),
        Request::Structured(query) => match gateway.run_structured(&query).await {
            Ok(output) => to_response(&output),
            Err(e) => error_response(&e),
        },
    }
}

/// Serve requests from `reader` until end of input.
pub async fn serve<E, R, W>(
    gateway: &QueryGateway<E>,
    mut reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    E: QueryExecutor,
    E::Output: Serialize,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut handled: u64 = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(gateway, line.trim_end_matches(['\n', '\r'])).await,
            Err(e) => {
                warn!("Request line is not valid UTF-8: {}", e);
                error_response(&QueryError::invalid_argument(format!(
                    "Request line is not valid UTF-8: {}",
                    e
                )))
            }
        };
        writer.write_all(response.to_string().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        handled += 1;
    }

    debug!("Input closed after {} request(s)", handled);
    Ok(())
}
