//! MessagePack encoding of the records on the bus and in the table.

use std::any::type_name;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::prelude::*;

pub fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    let bytes = rmp_serde::to_vec_named(value)
        .with_context(|| format!("failed to encode `{}`", type_name::<T>()))?;
    Ok(bytes.into())
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .with_context(|| format!("malformed `{}` record", type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::features::Features;
    use crate::trainer::models::{Entry, Message, Rating, Stage};

    #[test]
    fn message_ok() -> Result {
        let message = Message {
            rating: Rating {
                user_id: "1".to_string(),
                product_id: "2".to_string(),
                score: 4.5,
            },
            iters: 3,
            stage: Stage::Product {
                features: Features::from(vec![0.25, 0.5]),
            },
        };
        assert_eq!(decode::<Message>(&encode(&message)?)?, message);
        Ok(())
    }

    #[test]
    fn partial_entry_ok() -> Result {
        let entry = Entry {
            u: None,
            p: Some(Features::from(vec![1.0])),
        };
        assert_eq!(decode::<Entry>(&encode(&entry)?)?, entry);
        Ok(())
    }

    #[test]
    fn malformed_err() -> Result {
        let rating = Rating {
            user_id: "1".to_string(),
            product_id: "2".to_string(),
            score: 1.0,
        };
        let error = decode::<Message>(&encode(&rating)?).unwrap_err();
        assert!(error.to_string().starts_with("malformed"), "{}", error);
        assert!(decode::<Rating>(b"\xc1").is_err());
        Ok(())
    }
}
