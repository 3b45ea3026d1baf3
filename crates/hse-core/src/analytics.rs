//! Completion statistics computed over a [`Grid`].
//!
//! Each KPI contributes the share of its periods in each status; the overall
//! figures are averages of those shares across KPIs. With a selected period a
//! KPI contributes 100 to its status for that period and 0 elsewhere.
//! `needs_review` counts as not started.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  grid::{Grid, GridRow},
  value::KpiStatus,
};

/// Sections at or above this completion are top performers.
pub const TOP_PERFORMER_THRESHOLD: f64 = 70.0;
/// Sections below this completion need attention.
pub const NEEDS_ATTENTION_THRESHOLD: f64 = 40.0;
const HIGHLIGHT_LIMIT: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsFilter {
  pub section_id: Option<Uuid>,
  pub period_id:  Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionStat {
  pub section_id:            Uuid,
  pub section_name:          String,
  pub order_idx:             i32,
  pub total:                 usize,
  /// `total` scaled by the completion share, rounded.
  pub completed:             usize,
  pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStat {
  pub period_id:             Uuid,
  pub label:                 String,
  pub total:                 usize,
  pub completed:             usize,
  pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionScore {
  pub section:    String,
  pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
  pub total_kpis:             usize,
  pub completion_percentage:  f64,
  pub in_progress_percentage: f64,
  pub not_started_percentage: f64,
  pub blocked_percentage:     f64,
  pub section_stats:          Vec<SectionStat>,
  pub period_comparison:      Vec<PeriodStat>,
  pub top_performers:         Vec<SectionScore>,
  pub needs_attention:        Vec<SectionScore>,
}

/// Percentage of a row's cells in each bucket.
#[derive(Debug, Default, Clone, Copy)]
struct Shares {
  done:        f64,
  in_progress: f64,
  blocked:     f64,
  not_started: f64,
}

impl Shares {
  fn add(&mut self, status: KpiStatus, weight: f64) {
    match status {
      KpiStatus::Done => self.done += weight,
      KpiStatus::InProgress => self.in_progress += weight,
      KpiStatus::Blocked => self.blocked += weight,
      KpiStatus::NotStarted | KpiStatus::NeedsReview => self.not_started += weight,
    }
  }
}

fn row_shares(row: &GridRow, period_id: Option<Uuid>) -> Shares {
  let mut shares = Shares::default();
  match period_id {
    Some(id) => {
      let status = row
        .cells
        .iter()
        .find(|c| c.period_id == id)
        .map_or(KpiStatus::NotStarted, |c| c.status);
      shares.add(status, 100.0);
    }
    None if !row.cells.is_empty() => {
      let weight = 100.0 / row.cells.len() as f64;
      for cell in &row.cells {
        shares.add(cell.status, weight);
      }
    }
    None => {}
  }
  shares
}

fn average(total: f64, count: usize) -> f64 {
  if count == 0 { 0.0 } else { total / count as f64 }
}

/// Compute dashboard statistics for `grid`, narrowed by `filter`.
pub fn analyze(grid: &Grid, filter: &AnalyticsFilter) -> Analytics {
  let groups: Vec<_> = grid
    .sections
    .iter()
    .filter(|g| filter.section_id.is_none_or(|id| g.section.section_id == id))
    .collect();

  let mut totals = Shares::default();
  let mut total_kpis = 0;
  let mut section_stats = Vec::with_capacity(groups.len());

  for group in &groups {
    let mut section_done = 0.0;
    for row in &group.rows {
      let shares = row_shares(row, filter.period_id);
      totals.done += shares.done;
      totals.in_progress += shares.in_progress;
      totals.blocked += shares.blocked;
      totals.not_started += shares.not_started;
      section_done += shares.done;
    }
    total_kpis += group.rows.len();

    let completion = average(section_done, group.rows.len());
    section_stats.push(SectionStat {
      section_id:            group.section.section_id,
      section_name:          group.section.name.clone(),
      order_idx:             group.section.order_idx,
      total:                 group.rows.len(),
      completed:             (group.rows.len() as f64 * completion / 100.0).round() as usize,
      completion_percentage: completion,
    });
  }
  section_stats.sort_by_key(|s| s.order_idx);

  let period_comparison = grid
    .periods
    .iter()
    .map(|period| {
      let completed = groups
        .iter()
        .flat_map(|g| g.rows.iter())
        .filter(|row| {
          row
            .cells
            .iter()
            .any(|c| c.period_id == period.period_id && c.status == KpiStatus::Done)
        })
        .count();
      PeriodStat {
        period_id: period.period_id,
        label: period.label.clone(),
        total: total_kpis,
        completed,
        completion_percentage: average(completed as f64 * 100.0, total_kpis),
      }
    })
    .collect();

  let score = |s: &SectionStat| SectionScore {
    section:    s.section_name.clone(),
    percentage: s.completion_percentage,
  };

  let mut top: Vec<&SectionStat> = section_stats
    .iter()
    .filter(|s| s.completion_percentage >= TOP_PERFORMER_THRESHOLD)
    .collect();
  top.sort_by(|a, b| b.completion_percentage.total_cmp(&a.completion_percentage));

  let mut attention: Vec<&SectionStat> = section_stats
    .iter()
    .filter(|s| s.completion_percentage < NEEDS_ATTENTION_THRESHOLD)
    .collect();
  attention.sort_by(|a, b| a.completion_percentage.total_cmp(&b.completion_percentage));

  Analytics {
    total_kpis,
    completion_percentage: average(totals.done, total_kpis),
    in_progress_percentage: average(totals.in_progress, total_kpis),
    not_started_percentage: average(totals.not_started, total_kpis),
    blocked_percentage: average(totals.blocked, total_kpis),
    top_performers: top.into_iter().take(HIGHLIGHT_LIMIT).map(score).collect(),
    needs_attention: attention.into_iter().take(HIGHLIGHT_LIMIT).map(score).collect(),
    section_stats,
    period_comparison,
  }
}
