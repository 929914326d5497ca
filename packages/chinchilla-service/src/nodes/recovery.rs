use crate::{orchestrator::Limits, session::{SessionPatch, SessionState}};

pub fn widen_filter(state: &SessionState, limits: &Limits) -> SessionPatch {
	SessionPatch {
		filter_level: Some(state.filter_level.saturating_add(1).min(limits.max_filter_level)),
		..Default::default()
	}
}

/// Starts a new rewrite cycle from the narrowest filter.
pub fn increment_retry(state: &SessionState, limits: &Limits) -> SessionPatch {
	SessionPatch {
		retry_count: Some(state.retry_count.saturating_add(1).min(limits.max_retries)),
		filter_level: Some(0),
		..Default::default()
	}
}
