//! Wires the learner and the refeeder groups to an in-process broker.

use std::future::Future;

use tokio::task::JoinSet;

use crate::prelude::*;
use crate::runtime::broker::Broker;
use crate::runtime::partition::{spawn_learner, spawn_refeeder};
use crate::runtime::shutdown::{self, Shutdown, Signal};
use crate::runtime::table::Table;
use crate::trainer::codec;
use crate::trainer::features::Initializer;
use crate::trainer::learner::Learner;
use crate::trainer::models::{Entry, Rating, Update};
use crate::trainer::parameters::Parameters;
use crate::trainer::refeeder::Refeeder;
use crate::trainer::validator::Validator;

pub struct Pipeline<V> {
    broker: Broker,
    table: Table,
    learner: Arc<Learner<V>>,
    signal: Signal,
    tasks: JoinSet<Result>,
}

impl<V: Validator + 'static> Pipeline<V> {
    /// Spawns the partitions of the learner and the refeeder.
    #[instrument(skip_all, fields(group = group, n_partitions = n_partitions))]
    pub fn start(
        group: &str,
        parameters: Parameters,
        delay: StdDuration,
        n_partitions: usize,
        seed: u64,
        validator: V,
    ) -> Result<Self> {
        ensure!(n_partitions >= 1, "at least one partition is needed");
        let learner = Arc::new(Learner::new(group, validator, parameters, Initializer::new(seed))?);
        let refeeder = Arc::new(Refeeder::new(group, delay));

        let broker = Broker::default();
        let table = Table::default();
        let (signal, shutdown) = shutdown::channel();
        let mut tasks = JoinSet::new();
        spawn_learner(&mut tasks, &broker, &table, Arc::clone(&learner), n_partitions, &shutdown);
        spawn_refeeder(&mut tasks, &broker, refeeder, &shutdown);
        info!("started");

        Ok(Self {
            broker,
            table,
            learner,
            signal,
            tasks,
        })
    }

    #[must_use]
    pub const fn learner(&self) -> &Arc<Learner<V>> {
        &self.learner
    }

    /// Read-only view of the learned features.
    #[must_use]
    pub fn view(&self) -> Table {
        self.table.clone()
    }

    #[must_use]
    pub fn shutdown(&self) -> Shutdown {
        self.signal.subscribe()
    }

    /// Publishes the ratings to the input topic, keyed by the user.
    pub fn produce(&self, ratings: &[Rating]) -> Result {
        let topic = &self.learner.topics().input;
        for rating in ratings {
            self.broker.publish(topic, &rating.user_id, codec::encode(rating)?);
        }
        debug!(n_ratings = ratings.len(), "produced");
        Ok(())
    }

    /// Publishes the feature overwrite to the update topic.
    pub fn push_update(&self, update: &Update) -> Result {
        self.broker
            .publish(&self.learner.topics().update, &update.key, codec::encode(update)?);
        Ok(())
    }

    /// Overwrites the features with the ones of the model and waits until they are stored.
    pub async fn load(&mut self, model: &AHashMap<String, Entry>) -> Result {
        for (key, entry) in model {
            let update = Update {
                key: key.clone(),
                u: entry.u.clone(),
                p: entry.p.clone(),
            };
            self.push_update(&update)?;
        }
        self.wait_idle().await?;
        info!(n_keys = model.len(), "loaded");
        Ok(())
    }

    /// Runs an auxiliary task alongside the partitions. It should stop on [`Pipeline::shutdown`].
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Waits until every published record is processed, including all the training passes.
    ///
    /// Fails as soon as any task fails.
    pub async fn wait_idle(&mut self) -> Result {
        tokio::select! {
            _ = self.broker.wait_idle() => Ok(()),
            joined = self.tasks.join_next() => match joined {
                Some(joined) => {
                    joined??;
                    bail!("a pipeline task has stopped unexpectedly")
                }
                None => bail!("no pipeline tasks are running"),
            },
        }
    }

    /// Signals the shutdown and waits for the tasks.
    pub async fn stop(mut self) -> Result {
        self.signal.trigger();
        while let Some(joined) = self.tasks.join_next().await {
            joined??;
        }
        info!(n_in_flight = self.broker.n_in_flight(), "stopped");
        Ok(())
    }
}
