use std::{fmt::Display, future::Future, time::Duration};

/// Outcome of one timeout-bounded branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Branch<T> {
	Ready(T),
	Failed(String),
	TimedOut,
}

pub async fn bounded<F, T, E>(future: F, timeout: Duration) -> Branch<T>
where
	F: Future<Output = Result<T, E>>,
	E: Display,
{
	match tokio::time::timeout(timeout, future).await {
		Ok(Ok(value)) => Branch::Ready(value),
		Ok(Err(err)) => Branch::Failed(err.to_string()),
		Err(_) => Branch::TimedOut,
	}
}

/// Runs two independent branches concurrently, each under its own timeout.
///
/// Neither branch can fail the other; the caller decides what an empty branch means.
pub async fn join_bounded<A, B, TA, TB, EA, EB>(
	left: A,
	right: B,
	timeout: Duration,
) -> (Branch<TA>, Branch<TB>)
where
	A: Future<Output = Result<TA, EA>>,
	B: Future<Output = Result<TB, EB>>,
	EA: Display,
	EB: Display,
{
	tokio::join!(bounded(left, timeout), bounded(right, timeout))
}
