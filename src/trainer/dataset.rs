//! MovieLens ratings.

use std::fs;
use std::path::Path;

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::prelude::*;
use crate::trainer::models::Rating;

const HEADER_PREFIX: &str = "userId,";

/// Reads the `userId,movieId,rating,timestamp` file and shuffles the ratings.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_ratings(path: &Path, seed: u64) -> Result<Vec<Rating>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read `{}`", path.display()))?;
    let mut ratings = parse_ratings(&content)?;
    ratings.shuffle(&mut StdRng::seed_from_u64(seed));
    info!(n_ratings = ratings.len(), "loaded");
    Ok(ratings)
}

pub fn parse_ratings(content: &str) -> Result<Vec<Rating>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty() && !line.starts_with(HEADER_PREFIX))
        .map(|(index, line)| {
            parse_line(line).with_context(|| format!("malformed line #{}: `{}`", index + 1, line))
        })
        .collect()
}

fn parse_line(line: &str) -> Result<Rating> {
    let (user_id, product_id, score, _timestamp) = line
        .split(',')
        .collect_tuple()
        .ok_or_else(|| anyhow!("expected 4 fields"))?;
    Ok(Rating {
        user_id: user_id.to_owned(),
        product_id: product_id.to_owned(),
        score: score.trim().parse()?,
    })
}

/// Splits the ratings into the training and the holdout sets.
#[must_use]
pub fn split(mut ratings: Vec<Rating>, train_percentage: usize) -> (Vec<Rating>, Vec<Rating>) {
    let test = ratings.split_off(ratings.len() * train_percentage.min(100) / 100);
    (ratings, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = "userId,movieId,rating,timestamp\n1,31,2.5,1260759144\n1,1029,3.0,1260759179\n\n2,10,4.0,835355493\n";

    #[test]
    fn parse_ratings_ok() -> Result {
        let ratings = parse_ratings(CONTENT)?;
        assert_eq!(ratings.len(), 3);
        assert_eq!(
            ratings[0],
            Rating {
                user_id: "1".to_owned(),
                product_id: "31".to_owned(),
                score: 2.5,
            },
        );
        assert_eq!(ratings[2].score, 4.0);
        Ok(())
    }

    #[test]
    fn wrong_field_count_err() {
        assert!(parse_ratings("1,31,2.5\n").is_err());
        assert!(parse_ratings("1,31,2.5,1,1\n").is_err());
    }

    #[test]
    fn wrong_score_err() {
        assert!(parse_ratings("1,31,great,1260759144\n").is_err());
    }

    #[test]
    fn split_ok() -> Result {
        let ratings = parse_ratings(CONTENT)?;
        let (train, test) = split(ratings.clone(), 67);
        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 1);
        assert_eq!(test[0], ratings[2]);

        let (train, test) = split(ratings, 100);
        assert_eq!((train.len(), test.len()), (3, 0));
        Ok(())
    }
}
