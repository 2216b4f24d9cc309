use crate::render::{Locator, RenderSession, Scope, SessionError};
use std::time::Duration;

/// Outcome of an ordered fallback lookup
#[derive(Debug)]
pub enum Resolution<E> {
    /// The element located by the first strategy that matched
    Found { element: E, strategy: usize },
    /// Every strategy ran out of time
    Exhausted,
}

impl<E> Resolution<E> {
    pub fn into_element(self) -> Option<E> {
        match self {
            Resolution::Found { element, .. } => Some(element),
            Resolution::Exhausted => None,
        }
    }
}

/// Resolves an element through an ordered list of strategies
///
/// Each strategy is polled until it matches or `wait` elapses for that
/// strategy; the resolver then moves on to the next one. The first strategy to
/// match wins and later strategies are never evaluated, so the order encodes
/// the priority among known markup variants.
///
/// # Arguments
///
/// * `session` - The rendering session holding the current page
/// * `scope` - The page or an element to search below
/// * `strategies` - Locators in priority order
/// * `wait` - Time budget of each strategy
///
/// # Returns
///
/// * `Ok(Resolution::Found)` - The element and the index of the winning strategy
/// * `Ok(Resolution::Exhausted)` - No strategy matched; total time is bounded by
///   `strategies.len() * wait`
/// * `Err(SessionError)` - The session became unusable
pub async fn resolve<S>(
    session: &mut S,
    scope: Scope<'_, S::Element>,
    strategies: &[Locator],
    wait: Duration,
) -> Result<Resolution<S::Element>, SessionError>
where
    S: RenderSession,
{
    for (index, locator) in strategies.iter().enumerate() {
        if let Some(element) = session.wait_for_element(scope, locator, wait).await? {
            tracing::trace!("Strategy {} ({}) matched", index, locator);
            return Ok(Resolution::Found {
                element,
                strategy: index,
            });
        }
        tracing::trace!("Strategy {} ({}) exhausted", index, locator);
    }

    Ok(Resolution::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::time::Instant;

    /// Session whose page only contains elements for the listed selectors
    struct CountingSession {
        present: Vec<&'static str>,
        calls: HashMap<String, usize>,
        fatal_on: Option<&'static str>,
    }

    impl CountingSession {
        fn new(present: Vec<&'static str>) -> Self {
            Self {
                present,
                calls: HashMap::new(),
                fatal_on: None,
            }
        }

        fn calls(&self, selector: &str) -> usize {
            self.calls.get(selector).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl RenderSession for CountingSession {
        type Element = String;

        async fn navigate(&mut self, _url: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn find_all(
            &mut self,
            _scope: Scope<'_, String>,
            locator: &Locator,
        ) -> Result<Vec<String>, SessionError> {
            let css = locator.to_css();
            *self.calls.entry(css.clone()).or_default() += 1;
            if self.fatal_on == Some(css.as_str()) {
                return Err(SessionError::Fatal("browser crashed".into()));
            }
            if css == "broken" {
                return Err(SessionError::Query("stale element".into()));
            }
            Ok(self
                .present
                .iter()
                .filter(|p| **p == css)
                .map(|p| p.to_string())
                .collect())
        }

        async fn attribute(&mut self, _e: &String, _n: &str) -> Result<Option<String>, SessionError> {
            Ok(None)
        }

        async fn text(&mut self, e: &String) -> Result<String, SessionError> {
            Ok(e.clone())
        }

        async fn markup(&mut self, _scope: Scope<'_, String>) -> Result<String, SessionError> {
            Ok(String::new())
        }
    }

    fn strategies() -> Vec<Locator> {
        vec![Locator::css("s1"), Locator::css("s2"), Locator::css("s3")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_strategy_wins_third_never_evaluated() {
        let mut session = CountingSession::new(vec!["s2", "s3"]);
        let result = resolve(&mut session, Scope::Page, &strategies(), Duration::from_secs(1))
            .await
            .unwrap();

        match result {
            Resolution::Found { element, strategy } => {
                assert_eq!(element, "s2");
                assert_eq!(strategy, 1);
            }
            Resolution::Exhausted => panic!("expected a match"),
        }
        assert!(session.calls("s1") > 1, "s1 should have been polled");
        assert_eq!(session.calls("s2"), 1);
        assert_eq!(session.calls("s3"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_bounded_by_sum_of_waits() {
        let mut session = CountingSession::new(vec![]);
        let wait = Duration::from_millis(700);
        let start = Instant::now();

        let result = resolve(&mut session, Scope::Page, &strategies(), wait)
            .await
            .unwrap();

        assert!(matches!(result, Resolution::Exhausted));
        assert!(start.elapsed() <= wait * 3);
        assert!(session.calls("s3") > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_errors_keep_polling() {
        let mut session = CountingSession::new(vec!["s2"]);
        let strategies = vec![Locator::css("broken"), Locator::css("s2")];

        let result = resolve(&mut session, Scope::Page, &strategies, Duration::from_millis(500))
            .await
            .unwrap();
        assert!(matches!(result, Resolution::Found { strategy: 1, .. }));
        assert!(session.calls("broken") > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_propagates() {
        let mut session = CountingSession::new(vec!["s3"]);
        session.fatal_on = Some("s2");

        let err = resolve(&mut session, Scope::Page, &strategies(), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.calls("s3"), 0);
    }

    #[tokio::test]
    async fn test_empty_strategy_list_is_exhausted() {
        let mut session = CountingSession::new(vec!["s1"]);
        let result = resolve(&mut session, Scope::Page, &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.into_element().is_none());
    }
}
