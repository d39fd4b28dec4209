//! Learns the user and product features with a three-stage protocol per rating:
//!
//! ```text
//!    USER                               PRODUCT
//!     |                                    |
//!     * entry                              |
//!     |        user features               |
//!     +----------------------------------->|
//!     |                                    * validate, update P
//!     |        product features            |
//!     |<-----------------------------------+
//!     * update U
//!     |
//!     +--> refeed, if more passes are left
//! ```
//!
//! Every callback expects that the records of its key are delivered one at a time
//! and in order. This is the only thing which makes the entry updates safe: the entries
//! are never locked.

use crate::prelude::*;
use crate::runtime::{StatefulContext, Topics};
use crate::trainer::codec;
use crate::trainer::features::{Features, Initializer, Side};
use crate::trainer::models::{Message, Rating, Stage, Update};
use crate::trainer::parameters::Parameters;
use crate::trainer::sgd::Sgd;
use crate::trainer::validator::Validator;

/// Factorizes the user-product rating matrix.
pub struct Learner<V> {
    topics: Topics,
    parameters: Parameters,
    validator: V,
    sgd: Sgd,
    initializer: Initializer,
}

impl<V: Validator> Learner<V> {
    pub fn new(
        group: &str,
        validator: V,
        parameters: Parameters,
        initializer: Initializer,
    ) -> Result<Self> {
        parameters.validate()?;
        Ok(Self {
            topics: Topics::new(group),
            sgd: Sgd::new(&parameters),
            parameters,
            validator,
            initializer,
        })
    }

    #[must_use]
    pub const fn topics(&self) -> &Topics {
        &self.topics
    }

    #[must_use]
    pub const fn sgd(&self) -> &Sgd {
        &self.sgd
    }

    /// Decodes the record and dispatches it to the callback of its topic.
    ///
    /// Precondition: no other record of the same key is being processed.
    pub fn process(&self, ctx: &mut impl StatefulContext, topic: &str, payload: &[u8]) -> Result {
        if topic == self.topics.loopback {
            self.stage(ctx, codec::decode(payload)?)
        } else if topic == self.topics.input {
            self.entry(ctx, codec::decode(payload)?)
        } else if topic == self.topics.update {
            self.update(ctx, codec::decode(payload)?)
        } else {
            bail!("unexpected topic `{}`", topic)
        }
    }

    /// Starts the first pass of a new rating, keyed by the user.
    ///
    /// Precondition: no other record of the same key is being processed.
    pub fn entry(&self, ctx: &mut impl StatefulContext, rating: Rating) -> Result {
        let features = self.user_features(ctx)?;
        let message = Message {
            iters: self.parameters.iterations,
            stage: Stage::Product { features },
            rating,
        };
        let product_id = message.rating.product_id.clone();
        ctx.loopback(&product_id, &message)
    }

    /// Advances a rating through its pass.
    ///
    /// Precondition: no other record of the same key is being processed.
    pub fn stage(&self, ctx: &mut impl StatefulContext, message: Message) -> Result {
        let Message { rating, iters, stage } = message;
        trace!(key = ctx.key(), stage = stage.name(), iters);
        ensure!(
            iters >= 1,
            "`{}` stage of the rating `{}`/`{}` has no passes left",
            stage.name(),
            rating.user_id,
            rating.product_id,
        );

        match stage {
            Stage::Entry => {
                let features = self.user_features(ctx)?;
                let product_id = rating.product_id.clone();
                let message = Message {
                    rating,
                    iters,
                    stage: Stage::Product { features },
                };
                ctx.loopback(&product_id, &message)
            }

            Stage::Product { features: user } => {
                let mut entry = ctx.value()?.unwrap_or_default();
                let product = entry.p.get_or_insert_with(|| {
                    self.initializer
                        .features(ctx.key(), Side::Product, self.parameters.rank)
                });
                self.validator
                    .validate(product.predict(&user, self.sgd.bias()), rating.score);
                self.sgd.apply(product, &user, rating.score);
                let features = product.clone();
                ctx.set_value(&entry)?;

                let user_id = rating.user_id.clone();
                let message = Message {
                    rating,
                    iters,
                    stage: Stage::User { features },
                };
                ctx.loopback(&user_id, &message)
            }

            Stage::User { features: product } => {
                let mut entry = ctx.value()?.unwrap_or_default();
                if entry.u.is_none() {
                    warn!(key = ctx.key(), "user features are missing at the user stage");
                }
                let user = entry.u.get_or_insert_with(|| {
                    self.initializer
                        .features(ctx.key(), Side::User, self.parameters.rank)
                });
                self.sgd.apply(user, &product, rating.score);
                ctx.set_value(&entry)?;

                if iters > 1 {
                    let message = Message {
                        rating,
                        iters: iters - 1,
                        stage: Stage::Entry,
                    };
                    let key = ctx.key().to_owned();
                    ctx.emit(&self.topics.refeed, &key, &message)?;
                }
                Ok(())
            }
        }
    }

    /// Overwrites the features which are present in the update.
    ///
    /// Precondition: no other record of the same key is being processed.
    pub fn update(&self, ctx: &mut impl StatefulContext, update: Update) -> Result {
        ensure!(
            update.key == ctx.key(),
            "update of `{}` is delivered to `{}`",
            update.key,
            ctx.key(),
        );
        for features in update.u.iter().chain(&update.p) {
            ensure!(
                features.rank() == self.parameters.rank,
                "update of `{}` has rank {}, expected {}",
                update.key,
                features.rank(),
                self.parameters.rank,
            );
        }
        let mut entry = ctx.value()?.unwrap_or_default();
        if let Some(u) = update.u {
            entry.u = Some(u);
        }
        if let Some(p) = update.p {
            entry.p = Some(p);
        }
        ctx.set_value(&entry)
    }

    /// Returns the user features of the current key, initializing them if needed.
    fn user_features(&self, ctx: &mut impl StatefulContext) -> Result<Features> {
        let mut entry = ctx.value()?.unwrap_or_default();
        match entry.u {
            Some(features) => Ok(features),
            None => {
                let features = self
                    .initializer
                    .features(ctx.key(), Side::User, self.parameters.rank);
                entry.u = Some(features.clone());
                ctx.set_value(&entry)?;
                Ok(features)
            }
        }
    }
}
