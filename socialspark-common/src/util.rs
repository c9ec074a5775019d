use thiserror::Error;
use time::Duration;

/// A strictly positive span of time, used for latencies and timeouts.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn new_unchecked(duration: Duration) -> Self {
        Self::new(duration).expect("Duration was not positive.")
    }

    pub fn from_millis(millis: u64) -> Result<Self, NonPositiveDurationError> {
        let millis = i64::try_from(millis).unwrap_or(i64::MAX);
        Duration::milliseconds(millis).try_into()
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }

    /// The same span as a [`std::time::Duration`], as expected by timers.
    #[must_use]
    pub fn as_std(&self) -> std::time::Duration {
        self.0.unsigned_abs()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::{NonPositiveDurationError, PositiveDuration};
    use time::Duration;

    #[test]
    fn rejects_zero_and_negative() {
        assert_eq!(
            PositiveDuration::try_from(Duration::ZERO),
            Err(NonPositiveDurationError(Duration::ZERO))
        );
        assert!(PositiveDuration::new(Duration::seconds(-3)).is_none());
        assert!(PositiveDuration::from_millis(0).is_err());
    }

    #[test]
    fn converts_to_std() {
        let duration = PositiveDuration::from_millis(1500).unwrap();
        assert_eq!(duration.get(), Duration::milliseconds(1500));
        assert_eq!(duration.as_std(), std::time::Duration::from_millis(1500));
    }
}
