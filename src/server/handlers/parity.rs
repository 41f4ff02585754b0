//! Parity API handler.
//!
//! Environments submit their geometry snapshots here to prove they
//! agree. A CI job typically posts the server's own snapshot as the
//! reference and a browser-captured one as the candidate.

use axum::Json;
use serde::Deserialize;

use crate::parity::{self, GeometrySnapshot, ParityReport};

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub reference: GeometrySnapshot,
    pub candidate: GeometrySnapshot,
}

/// Handle POST /api/parity/verify - compare two snapshots.
pub async fn verify(Json(params): Json<VerifyParams>) -> Json<ParityReport> {
    Json(parity::verify(&params.reference, &params.candidate))
}
