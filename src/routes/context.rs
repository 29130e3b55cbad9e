use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::future::{ready, Ready};
use thiserror::Error;

use crate::core::timeline::{offset_from_minutes, parse_day_or_today, DayWindow};
use crate::models::ErrorResponse;

pub const UTC_OFFSET_HEADER: &str = "X-Utc-Offset-Minutes";

#[derive(Debug, Error)]
#[error("Invalid X-Utc-Offset-Minutes header: {0}")]
pub struct InvalidOffset(String);

impl ResponseError for InvalidOffset {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::BadRequest().json(ErrorResponse::new("invalid_timezone", self.to_string(), 400))
    }
}

/// Per-request values handlers need besides the body
///
/// The client's timezone is sent explicitly on every request as minutes east
/// of UTC. Without the header the day boundaries are UTC.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub offset: FixedOffset,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(offset: FixedOffset, now: DateTime<Utc>) -> Self {
        Self { offset, now }
    }

    /// Local-day window for a `YYYY-MM-DD` query value, today when absent or malformed
    pub fn day_window(&self, raw: Option<&str>) -> DayWindow {
        DayWindow::for_local_date(self.day(raw), self.offset)
    }

    pub fn day(&self, raw: Option<&str>) -> NaiveDate {
        parse_day_or_today(raw, self.offset, self.now)
    }

    fn from_http(req: &HttpRequest) -> Result<Self, InvalidOffset> {
        let offset = match req.headers().get(UTC_OFFSET_HEADER) {
            None => FixedOffset::east_opt(0).ok_or_else(|| InvalidOffset("utc".to_string()))?,
            Some(value) => {
                let raw = value.to_str().map_err(|e| InvalidOffset(e.to_string()))?;
                let minutes: i32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| InvalidOffset(format!("'{}' is not a number of minutes", raw)))?;
                offset_from_minutes(minutes)
                    .ok_or_else(|| InvalidOffset(format!("{} minutes is out of range", minutes)))?
            }
        };

        Ok(Self::new(offset, Utc::now()))
    }
}

impl FromRequest for RequestContext {
    type Error = InvalidOffset;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_http(req))
    }
}
