use super::Error;
use crate::models::{Endpoint, Network, Request};
use std::fmt::Write;
use tracing::instrument;

/// Upper bound on speculative preallocation driven by header counts.
const MAX_PREALLOCATION: usize = 1 << 16;

/// Cursor over the non-blank lines of an instance file, each read as a
/// fixed number of unsigned integers.
struct Lines<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    last: usize,
}

impl<'a> Lines<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate(),
            last: 0,
        }
    }

    fn next_numbers(&mut self, expected: usize, what: &str) -> Result<(usize, Vec<u64>), Error> {
        loop {
            let Some((index, line)) = self.lines.next() else {
                return Err(Error::malformed(
                    self.last + 1,
                    format!("unexpected end of input, expected {what}"),
                ));
            };
            let line_number = index + 1;
            self.last = line_number;

            if line.trim().is_empty() {
                continue;
            }

            let numbers = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<u64>().map_err(|_| {
                        Error::malformed(
                            line_number,
                            format!("expected a non-negative integer in {what}, got '{token}'"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if numbers.len() != expected {
                return Err(Error::malformed(
                    line_number,
                    format!("expected {expected} values for {what}, got {}", numbers.len()),
                ));
            }

            return Ok((line_number, numbers));
        }
    }

    fn expect_end(&mut self) -> Result<(), Error> {
        match self.lines.find(|(_, line)| !line.trim().is_empty()) {
            Some((index, _)) => Err(Error::malformed(index + 1, "trailing content after the last request")),
            None => Ok(()),
        }
    }
}

fn to_count(value: u64, line: usize, what: &str) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| Error::malformed(line, format!("{what} {value} is too large")))
}

fn to_index(value: u64, bound: usize, line: usize, what: &str) -> Result<usize, Error> {
    match usize::try_from(value) {
        Ok(index) if index < bound => Ok(index),
        _ => Err(Error::malformed(
            line,
            format!("{what} {value} out of range, only {bound} exist"),
        )),
    }
}

fn to_latency(value: u64, line: usize) -> Result<u32, Error> {
    u32::try_from(value).map_err(|_| Error::malformed(line, format!("latency {value} is too large")))
}

/// Parses the whitespace-delimited instance format.
#[instrument(level = "debug", skip(input), fields(input_len = input.len()))]
pub fn parse_network(input: &str) -> Result<Network, Error> {
    let mut lines = Lines::new(input);

    let (line, header) = lines.next_numbers(5, "the header")?;
    let num_items = to_count(header[0], line, "item count")?;
    let num_endpoints = to_count(header[1], line, "endpoint count")?;
    let num_requests = to_count(header[2], line, "request count")?;
    let num_caches = to_count(header[3], line, "cache count")?;
    let capacity = header[4];

    if num_items == 0 {
        return Err(crate::models::NetworkError::NoItems.into());
    }

    let (line, items) = lines.next_numbers(num_items, "item sizes")?;
    if let Some(item) = items.iter().position(|&size| size == 0) {
        return Err(Error::malformed(line, format!("item {item} has size zero")));
    }

    let mut endpoints = Vec::with_capacity(num_endpoints.min(MAX_PREALLOCATION));
    for endpoint in 0..num_endpoints {
        let what = format!("endpoint {endpoint}");
        let (line, fields) = lines.next_numbers(2, &what)?;
        let base_latency = to_latency(fields[0], line)?;
        let num_overrides = to_count(fields[1], line, "override count")?;

        let mut cache_latencies = Vec::with_capacity(num_overrides.min(num_caches));
        for _ in 0..num_overrides {
            let (line, fields) = lines.next_numbers(2, &format!("a cache latency of {what}"))?;
            let cache = to_index(fields[0], num_caches, line, "cache")?;
            cache_latencies.push((cache, to_latency(fields[1], line)?));
        }

        endpoints.push(Endpoint::new(base_latency, cache_latencies));
    }

    let mut requests = Vec::with_capacity(num_requests.min(MAX_PREALLOCATION));
    for index in 0..num_requests {
        let (line, fields) = lines.next_numbers(3, &format!("request {index}"))?;
        requests.push(Request::new(
            to_index(fields[0], num_items, line, "item")?,
            to_index(fields[1], num_endpoints, line, "endpoint")?,
            fields[2],
        ));
    }

    lines.expect_end()?;

    Ok(Network::new(items, endpoints, num_caches, capacity, requests)?)
}

/// Writes a network in the instance format. Cache latencies that are not
/// below the base latency were dropped at load and are not written back.
pub fn format_network(network: &Network) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(
        out,
        "{} {} {} {} {}",
        network.num_items(),
        network.num_endpoints(),
        network.requests().len(),
        network.num_caches(),
        network.capacity()
    );

    let sizes: Vec<String> = network.items().iter().map(u64::to_string).collect();
    let _ = writeln!(out, "{}", sizes.join(" "));

    for endpoint in network.endpoints() {
        let _ = writeln!(
            out,
            "{} {}",
            endpoint.base_latency(),
            endpoint.cache_latencies().len()
        );
        for (cache, latency) in endpoint.cache_latencies() {
            let _ = writeln!(out, "{cache} {latency}");
        }
    }

    for request in network.requests() {
        let _ = writeln!(out, "{} {} {}", request.item, request.endpoint, request.count);
    }

    out
}
