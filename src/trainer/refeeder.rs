//! Feeds the messages back into the learner after a delay, so that the next training pass
//! does not start right away.

use std::future::Future;

use chrono::{Duration, Utc};
use tokio::time::{sleep, Sleep};

use crate::prelude::*;
use crate::runtime::shutdown::Shutdown;
use crate::runtime::{Context, Topics};
use crate::trainer::models::Message;

/// Default waiter: sleeps until the wall-clock deadline, or not at all if it has passed.
pub fn sleep_until(deadline: DateTime) -> Sleep {
    sleep((deadline - Utc::now()).to_std().unwrap_or_default())
}

pub struct Refeeder<W = fn(DateTime) -> Sleep> {
    topics: Topics,
    delay: StdDuration,
    wait_until: W,
}

impl Refeeder {
    pub fn new(group: &str, delay: StdDuration) -> Self {
        Self::with_waiter(group, delay, sleep_until)
    }
}

impl<W, F> Refeeder<W>
where
    W: Fn(DateTime) -> F,
    F: Future<Output = ()>,
{
    pub fn with_waiter(group: &str, delay: StdDuration, wait_until: W) -> Self {
        Self {
            topics: Topics::new(group),
            delay,
            wait_until,
        }
    }

    #[must_use]
    pub const fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Waits until the record timestamp plus the delay, then forwards the message
    /// to the learner loopback under the same key.
    ///
    /// Returns `false` if the shutdown came first, nothing is forwarded then.
    pub async fn refeed(
        &self,
        ctx: &mut impl Context,
        message: Message,
        shutdown: &mut Shutdown,
    ) -> Result<bool> {
        let deadline = ctx.timestamp() + Duration::from_std(self.delay)?;
        tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                debug!(key = ctx.key(), "cancelled");
                Ok(false)
            }
            _ = (self.wait_until)(deadline) => {
                let key = ctx.key().to_owned();
                ctx.emit(&self.topics.loopback, &key, &message)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::{pending, ready};

    use super::*;
    use crate::runtime::shutdown;
    use crate::trainer::models::{Rating, Stage};

    struct TestContext {
        timestamp: DateTime,
        emitted: Vec<(String, String, Message)>,
    }

    impl TestContext {
        fn new(timestamp: DateTime) -> Self {
            Self {
                timestamp,
                emitted: Vec::new(),
            }
        }
    }

    impl Context for TestContext {
        fn key(&self) -> &str {
            "key"
        }

        fn timestamp(&self) -> DateTime {
            self.timestamp
        }

        fn emit(&mut self, topic: &str, key: &str, message: &Message) -> Result {
            self.emitted
                .push((topic.to_owned(), key.to_owned(), message.clone()));
            Ok(())
        }
    }

    fn message() -> Message {
        Message {
            rating: Rating {
                user_id: "key".to_owned(),
                product_id: "product".to_owned(),
                score: 1.0,
            },
            iters: 2,
            stage: Stage::Entry,
        }
    }

    #[tokio::test]
    async fn refeed_ok() -> Result {
        let start = Utc::now();
        let delay = StdDuration::from_secs(3600);
        let expected_deadline = start + Duration::from_std(delay)?;
        let refeeder = Refeeder::with_waiter("group", delay, |deadline| {
            assert_eq!(deadline, expected_deadline);
            ready(())
        });
        let (_signal, mut shutdown) = shutdown::channel();
        let mut ctx = TestContext::new(start);

        assert!(refeeder.refeed(&mut ctx, message(), &mut shutdown).await?);
        assert_eq!(
            ctx.emitted,
            vec![("group-loop".to_owned(), "key".to_owned(), message())],
        );
        Ok(())
    }

    #[tokio::test]
    async fn past_due_ok() -> Result {
        let refeeder = Refeeder::new("group", StdDuration::from_secs(1));
        let (_signal, mut shutdown) = shutdown::channel();
        let mut ctx = TestContext::new(Utc::now() - Duration::hours(1));
        assert!(refeeder.refeed(&mut ctx, message(), &mut shutdown).await?);
        assert_eq!(ctx.emitted.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_ok() -> Result {
        let refeeder = Refeeder::with_waiter("group", StdDuration::ZERO, |_| pending::<()>());
        let (signal, mut shutdown) = shutdown::channel();
        let mut ctx = TestContext::new(Utc::now());
        signal.trigger();
        assert!(!refeeder.refeed(&mut ctx, message(), &mut shutdown).await?);
        assert!(ctx.emitted.is_empty());
        Ok(())
    }
}
