use serde::{Deserialize, Serialize};

use crate::trainer::features::Features;

/// Observed score of a product given by a user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Rating {
    pub user_id: String,
    pub product_id: String,
    pub score: f64,
}

/// Persisted state of a key.
///
/// The users and the products share the key space: an identifier used on both sides
/// holds both features, and they are trained independently of each other.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Entry {
    pub u: Option<Features>,
    pub p: Option<Features>,
}

/// Overwrites the features of a key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Update {
    pub key: String,
    pub u: Option<Features>,
    pub p: Option<Features>,
}

/// Rating in flight between the user and the product partitions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub rating: Rating,

    /// Remaining training passes, including the current one.
    pub iters: u32,

    pub stage: Stage,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Stage {
    /// Start of a pass, delivered to the user.
    Entry,

    /// Delivered to the product, carries the user features.
    Product { features: Features },

    /// Delivered back to the user, carries the updated product features.
    User { features: Features },
}

impl Stage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Product { .. } => "product",
            Self::User { .. } => "user",
        }
    }
}
