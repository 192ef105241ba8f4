//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the VALUE coach REST API to disk.
//!
//! Usage: `openapi [OUTPUT]`, where `OUTPUT` defaults to `openapi.json`.

use api_lib::web::rest::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&output, document)?;
    println!("OpenAPI document written to {}", output.display());
    Ok(())
}
