//! Partition tasks of the learner and the refeeder groups.

use std::future::Future;

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::prelude::*;
use crate::runtime::broker::{Broker, Delivery, Partition};
use crate::runtime::shutdown::Shutdown;
use crate::runtime::table::{Table, View};
use crate::runtime::{Context, StatefulContext};
use crate::trainer::codec;
use crate::trainer::learner::Learner;
use crate::trainer::models::{Entry, Message};
use crate::trainer::refeeder::Refeeder;
use crate::trainer::validator::Validator;

/// Subscribes the learner to its topics and spawns a task per partition.
pub fn spawn_learner<V: Validator + 'static>(
    tasks: &mut JoinSet<Result>,
    broker: &Broker,
    table: &Table,
    learner: Arc<Learner<V>>,
    n_partitions: usize,
    shutdown: &Shutdown,
) {
    let topics = learner.topics();
    let partitions = broker.subscribe(
        &[topics.input.as_str(), topics.update.as_str(), topics.loopback.as_str()],
        n_partitions,
    );
    for (index, partition) in partitions.into_iter().enumerate() {
        let task = run_learner_partition(
            partition,
            broker.clone(),
            table.clone(),
            Arc::clone(&learner),
            shutdown.clone(),
        );
        tasks.spawn(task.instrument(info_span!("learner", partition = index)));
    }
}

/// Subscribes the refeeder to the refeed topic and spawns its task.
pub fn spawn_refeeder<W, F>(
    tasks: &mut JoinSet<Result>,
    broker: &Broker,
    refeeder: Arc<Refeeder<W>>,
    shutdown: &Shutdown,
) where
    W: Fn(DateTime) -> F + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let partitions = broker.subscribe(&[refeeder.topics().refeed.as_str()], 1);
    for partition in partitions {
        let task = run_refeeder(partition, broker.clone(), Arc::clone(&refeeder), shutdown.clone());
        tasks.spawn(task.instrument(info_span!("refeeder")));
    }
}

async fn run_learner_partition<V: Validator>(
    mut partition: Partition,
    broker: Broker,
    table: Table,
    learner: Arc<Learner<V>>,
    mut shutdown: Shutdown,
) -> Result {
    debug!("started");
    loop {
        let Delivery { topic, record } = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            delivery = partition.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };
        let mut ctx = PartitionContext {
            key: &record.key,
            timestamp: record.timestamp,
            broker: &broker,
            table: &table,
            loopback: &learner.topics().loopback,
        };
        learner
            .process(&mut ctx, &topic, &record.payload)
            .with_context(|| {
                format!("failed to process a `{}` record of `{}`", topic, record.key)
            })?;
        // A failed record stays in flight, the pipeline is stopping anyway.
        broker.done();
    }
    debug!("stopped");
    Ok(())
}

async fn run_refeeder<W, F>(
    mut partition: Partition,
    broker: Broker,
    refeeder: Arc<Refeeder<W>>,
    mut shutdown: Shutdown,
) -> Result
where
    W: Fn(DateTime) -> F + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    debug!("started");
    let mut waits = JoinSet::<Result>::new();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            Some(joined) = waits.join_next() => joined??,
            delivery = partition.recv() => {
                let Delivery { topic, record } = match delivery {
                    Some(delivery) => delivery,
                    None => break,
                };
                let message: Message = codec::decode(&record.payload)
                    .with_context(|| {
                        format!("failed to refeed a `{}` record of `{}`", topic, record.key)
                    })?;
                let mut ctx = OwnedContext {
                    key: record.key,
                    timestamp: record.timestamp,
                    broker: broker.clone(),
                };
                let refeeder = Arc::clone(&refeeder);
                let broker = broker.clone();
                let mut shutdown = shutdown.clone();
                waits.spawn(async move {
                    refeeder.refeed(&mut ctx, message, &mut shutdown).await?;
                    broker.done();
                    Ok(())
                });
            }
        }
    }

    // The pending waits observe the shutdown on their own.
    while let Some(joined) = waits.join_next().await {
        joined??;
    }
    debug!("stopped");
    Ok(())
}

struct PartitionContext<'a> {
    key: &'a str,
    timestamp: DateTime,
    broker: &'a Broker,
    table: &'a Table,
    loopback: &'a str,
}

impl Context for PartitionContext<'_> {
    fn key(&self) -> &str {
        self.key
    }

    fn timestamp(&self) -> DateTime {
        self.timestamp
    }

    fn emit(&mut self, topic: &str, key: &str, message: &Message) -> Result {
        self.broker.publish(topic, key, codec::encode(message)?);
        Ok(())
    }
}

impl StatefulContext for PartitionContext<'_> {
    fn value(&self) -> Result<Option<Entry>> {
        self.table.get(self.key)
    }

    fn set_value(&mut self, entry: &Entry) -> Result {
        self.table.insert(self.key, entry)
    }

    fn loopback(&mut self, key: &str, message: &Message) -> Result {
        let topic = self.loopback;
        self.emit(topic, key, message)
    }
}

/// Context of a refeed wait, which outlives the delivery loop iteration.
struct OwnedContext {
    key: String,
    timestamp: DateTime,
    broker: Broker,
}

impl Context for OwnedContext {
    fn key(&self) -> &str {
        &self.key
    }

    fn timestamp(&self) -> DateTime {
        self.timestamp
    }

    fn emit(&mut self, topic: &str, key: &str, message: &Message) -> Result {
        self.broker.publish(topic, key, codec::encode(message)?);
        Ok(())
    }
}
