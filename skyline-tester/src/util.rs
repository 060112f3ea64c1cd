use anyhow::{Context, Result};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse `--seeds` tokens. Negative numbers wrap to their magnitude.
pub fn parse_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    tokens
        .iter()
        .map(|token| {
            token
                .parse::<u64>()
                .or_else(|_| token.parse::<i64>().map(i64::unsigned_abs))
                .with_context(|| format!("invalid seed `{token}`"))
        })
        .collect()
}
