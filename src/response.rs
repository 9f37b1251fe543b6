//! Success envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// `{"data": ...}`
#[derive(Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::OK, Json(Envelope { data }))
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope { data }))
}
