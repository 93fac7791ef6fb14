//! Client relationship lifecycle.
//!
//! Covers:
//! 1. **Reporting windows** -- half-open date windows and their trailing
//!    lookback sequence.
//! 2. **Classification** -- new / recurring / recovered / churned, pure
//!    recomputation over each client's full loan history every run.
//! 3. **Portfolio counts** -- lifecycle totals for the report.
//!
//! A loan's activity span runs from origination to contractual maturity;
//! a loan with outstanding balance stays active past maturity, a repaid
//! loan is treated as ended at maturity. "Recovered" takes precedence
//! over "recurring" when both hold. Clients whose activity ended before
//! the lookback horizon are absent from the output, not churned.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::LendingRiskError;
use crate::types::LoanRecord;
use crate::LendingRiskResult;

/// Default trailing lookback: four windows.
pub const DEFAULT_LOOKBACK_WINDOWS: u32 = 4;

/// Half-open date window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> LendingRiskResult<Self> {
        let window = ReportingWindow { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> LendingRiskResult<()> {
        if self.start >= self.end {
            return Err(LendingRiskError::Configuration(format!(
                "Reporting window [{}, {}) is empty.",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Number of days this window spans.
    pub fn length_days(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }

    /// The window `n` positions earlier in the trailing sequence of
    /// equal-length windows.
    pub fn preceding(&self, n: u32) -> ReportingWindow {
        let shift = Duration::days(self.length_days() * n as i64);
        ReportingWindow {
            start: self.start - shift,
            end: self.end - shift,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// Lifecycle policy: how many trailing windows bound the churn horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    #[serde(default = "default_lookback")]
    pub lookback_windows: u32,
}

fn default_lookback() -> u32 {
    DEFAULT_LOOKBACK_WINDOWS
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        LifecyclePolicy {
            lookback_windows: DEFAULT_LOOKBACK_WINDOWS,
        }
    }
}

impl LifecyclePolicy {
    pub fn validate(&self) -> LendingRiskResult<()> {
        if self.lookback_windows == 0 {
            return Err(LendingRiskError::Configuration(
                "Lifecycle lookback must cover at least one window.".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    New,
    Recurring,
    Recovered,
    Churned,
}

/// Derived lifecycle state for one client, recomputed fresh each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientState {
    pub customer_id: String,
    pub status: ClientStatus,
    /// The window the client is (or was last) active in.
    pub active_window: Option<ReportingWindow>,
    /// The window the client lapsed over, when the status implies one.
    pub lapsed_window: Option<ReportingWindow>,
}

/// Lifecycle counts for the report's client goals section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientGoals {
    pub new: u64,
    pub recurring: u64,
    pub recovered: u64,
    pub churned: u64,
}

/// Whether the loan's activity span overlaps the window.
///
/// Span is `[origination, maturity)` for a repaid loan and open-ended
/// while any balance is outstanding.
fn active_in(loan: &LoanRecord, window: &ReportingWindow) -> bool {
    if loan.origination_date >= window.end {
        return false;
    }
    if loan.is_active() {
        return true;
    }
    loan.maturity_date() > window.start
}

/// Classify one client from their full loan history.
///
/// Returns `None` for clients with no lifecycle event this run: either
/// continuously active through the lookback, or inactive since before
/// the lookback horizon.
pub fn classify_client(
    customer_id: &str,
    history: &[&LoanRecord],
    current: &ReportingWindow,
    policy: &LifecyclePolicy,
) -> LendingRiskResult<Option<ClientState>> {
    current.validate()?;
    policy.validate()?;

    let active_now = history.iter().any(|l| active_in(l, current));
    let prior_exists = history.iter().any(|l| l.origination_date < current.start);

    if active_now {
        if !prior_exists {
            return Ok(Some(ClientState {
                customer_id: customer_id.to_string(),
                status: ClientStatus::New,
                active_window: Some(current.clone()),
                lapsed_window: None,
            }));
        }
        // Recovered beats recurring: a client coming back from a lapse is
        // the more actionable signal.
        let previous = current.preceding(1);
        let lapsed = !history.iter().any(|l| active_in(l, &previous));
        if lapsed {
            return Ok(Some(ClientState {
                customer_id: customer_id.to_string(),
                status: ClientStatus::Recovered,
                active_window: Some(current.clone()),
                lapsed_window: Some(previous),
            }));
        }
        let has_ended_prior = history
            .iter()
            .any(|l| !l.is_active() && l.maturity_date() <= current.start);
        if has_ended_prior {
            return Ok(Some(ClientState {
                customer_id: customer_id.to_string(),
                status: ClientStatus::Recurring,
                active_window: Some(current.clone()),
                lapsed_window: None,
            }));
        }
        // Continuously active on one ongoing facility: no event.
        return Ok(None);
    }

    // Not active now: churned if activity ended inside the lookback.
    for n in 1..=policy.lookback_windows {
        let window = current.preceding(n);
        if history.iter().any(|l| active_in(l, &window)) {
            return Ok(Some(ClientState {
                customer_id: customer_id.to_string(),
                status: ClientStatus::Churned,
                active_window: Some(window),
                lapsed_window: Some(current.clone()),
            }));
        }
    }

    Ok(None)
}

/// Classify every client in the book and tally lifecycle counts.
pub fn track_clients(
    loans: &[LoanRecord],
    current: &ReportingWindow,
    policy: &LifecyclePolicy,
) -> LendingRiskResult<(Vec<ClientState>, ClientGoals)> {
    let mut by_customer: BTreeMap<&str, Vec<&LoanRecord>> = BTreeMap::new();
    for loan in loans {
        by_customer
            .entry(loan.customer_id.as_str())
            .or_default()
            .push(loan);
    }

    let mut states = Vec::new();
    let mut goals = ClientGoals::default();
    for (customer_id, history) in by_customer {
        if let Some(state) = classify_client(customer_id, &history, current, policy)? {
            match state.status {
                ClientStatus::New => goals.new += 1,
                ClientStatus::Recurring => goals.recurring += 1,
                ClientStatus::Recovered => goals.recovered += 1,
                ClientStatus::Churned => goals.churned += 1,
            }
            states.push(state);
        }
    }
    Ok((states, goals))
}
