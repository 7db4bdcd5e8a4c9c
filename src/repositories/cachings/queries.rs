use super::Error;
use crate::models::{CacheSlot, Caching};
use std::fmt::Write;
use tracing::instrument;

fn parse_token(token: &str, line: usize) -> Result<usize, Error> {
    token
        .parse::<usize>()
        .map_err(|_| Error::malformed(line, format!("expected a non-negative integer, got '{token}'")))
}

/// Parses the assignment format for a network with `num_caches` caches.
///
/// Only caches holding items are listed; every cache missing from the file
/// is empty. Item ids are not checked against a network here, see
/// [`Caching::validate`].
#[instrument(level = "debug", skip(input), fields(input_len = input.len(), num_caches = num_caches))]
pub fn parse_caching(input: &str, num_caches: usize) -> Result<Caching, Error> {
    let mut lines = input
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((line, header)) = lines.next() else {
        return Err(Error::malformed(1, "missing cache count"));
    };
    let mut header = header.split_whitespace();
    let listed = match (header.next(), header.next()) {
        (Some(token), None) => parse_token(token, line)?,
        _ => return Err(Error::malformed(line, "expected a single cache count")),
    };
    if listed > num_caches {
        return Err(Error::malformed(
            line,
            format!("{listed} caches listed, but only {num_caches} exist"),
        ));
    }

    let mut caches = vec![CacheSlot::new(); num_caches];
    let mut seen = vec![false; num_caches];
    let mut last = line;

    for _ in 0..listed {
        let Some((line, content)) = lines.next() else {
            return Err(Error::malformed(
                last + 1,
                format!("expected {listed} cache lines"),
            ));
        };
        last = line;

        let mut tokens = content.split_whitespace();
        let cache = tokens
            .next()
            .map(|token| parse_token(token, line))
            .transpose()?
            .ok_or_else(|| Error::malformed(line, "missing cache id"))?;

        if cache >= num_caches {
            return Err(Error::malformed(
                line,
                format!("cache {cache} out of range, only {num_caches} exist"),
            ));
        }
        if std::mem::replace(&mut seen[cache], true) {
            return Err(Error::malformed(line, format!("cache {cache} listed twice")));
        }

        caches[cache] = tokens
            .map(|token| parse_token(token, line))
            .collect::<Result<CacheSlot, _>>()?;
    }

    if let Some((line, _)) = lines.next() {
        return Err(Error::malformed(line, "trailing content after the last cache"));
    }

    Ok(Caching::from_caches(caches))
}

/// Writes an assignment, omitting empty caches. Items are written in
/// ascending order.
pub fn format_caching(caching: &Caching) -> String {
    let non_empty: Vec<_> = caching
        .caches()
        .iter()
        .enumerate()
        .filter(|(_, slot)| !slot.is_empty())
        .collect();

    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", non_empty.len());
    for (cache, slot) in non_empty {
        let _ = write!(out, "{cache}");
        for item in slot {
            let _ = write!(out, " {item}");
        }
        out.push('\n');
    }

    out
}
