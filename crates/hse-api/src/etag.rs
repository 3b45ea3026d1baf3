//! ETag computation for grid responses.
//!
//! The tag is a SHA-256 over the grid's shape and the identity and version of
//! every recorded cell. Any value write bumps a version, so it changes the
//! tag; reloading an unchanged grid yields the same tag.

use axum::http::{HeaderMap, header};
use hse_core::grid::Grid;
use sha2::{Digest, Sha256};

/// Compute a quoted ETag for `grid`.
pub fn grid_etag(grid: &Grid) -> String {
  let mut hasher = Sha256::new();

  for period in &grid.periods {
    hasher.update(period.period_id.as_bytes());
  }
  for group in &grid.sections {
    hasher.update(group.section.section_id.as_bytes());
    for row in &group.rows {
      hasher.update(row.kpi.kpi_id.as_bytes());
      for cell in row.cells.iter().filter(|c| c.is_recorded()) {
        hasher.update(cell.period_id.as_bytes());
        hasher.update(cell.version.to_le_bytes());
      }
    }
  }

  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Whether an `If-None-Match` header matches `etag`.
///
/// Accepts a comma-separated list, `*`, weak tags and unquoted tags.
pub fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
  let Some(value) = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
  else {
    return false;
  };

  let wanted = etag.trim_matches('"');
  value.split(',').map(str::trim).any(|tag| {
    tag == "*" || tag.trim_start_matches("W/").trim_matches('"') == wanted
  })
}
