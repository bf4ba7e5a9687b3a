// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Origin-based routing of records to streams.
//!
//! Every stream is registered with a set of regular expressions. An origin
//! routes to each stream with at least one matching pattern. Results are
//! memoized per distinct origin for the life of the router, since the
//! pattern sets are fixed once configuration has been applied.

use fnv::FnvHashMap;
use regex::Regex;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::errors::ConfigurationError;

#[derive(Debug)]
struct Route<S> {
    stream: S,
    patterns: Vec<Regex>,
}

/// Maps origin identifiers to the set of streams that want them.
#[derive(Debug)]
pub struct Router<S> {
    routes: Vec<Route<S>>,
    cache: RwLock<FnvHashMap<String, Arc<HashSet<S>>>>,
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            cache: RwLock::new(FnvHashMap::default()),
        }
    }
}

impl<S> Router<S>
where
    S: Clone + Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `stream` with `patterns`.
    ///
    /// Registering a stream again adds its new patterns to the existing
    /// entry. A pattern already registered for the stream is ignored.
    pub fn register<I, P>(&mut self, stream: S, patterns: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| {
                let pattern = p.as_ref();
                Regex::new(pattern).map_err(|source| ConfigurationError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let index = match self.routes.iter().position(|r| r.stream == stream) {
            Some(index) => index,
            None => {
                self.routes.push(Route {
                    stream,
                    patterns: Vec::new(),
                });
                self.routes.len() - 1
            }
        };
        let route = &mut self.routes[index];
        for regex in compiled {
            if !route.patterns.iter().any(|p| p.as_str() == regex.as_str()) {
                route.patterns.push(regex);
            }
        }

        // Earlier lookups may no longer be complete.
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
        Ok(())
    }

    /// Returns the streams whose patterns match `origin`.
    ///
    /// An empty set means the record has no destination and is dropped.
    pub fn route(&self, origin: &str) -> Arc<HashSet<S>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(streams) = cache.get(origin) {
                return Arc::clone(streams);
            }
        }

        let streams: HashSet<S> = self
            .routes
            .iter()
            .filter(|route| route.patterns.iter().any(|p| p.is_match(origin)))
            .map(|route| route.stream.clone())
            .collect();
        if streams.is_empty() {
            debug!(origin, "ROUTER | No stream matches origin");
        }
        let streams = Arc::new(streams);

        if let Ok(mut cache) = self.cache.write() {
            // First writer wins; a concurrent lookup computed the same set.
            let entry = cache
                .entry(origin.to_string())
                .or_insert_with(|| Arc::clone(&streams));
            return Arc::clone(entry);
        }
        streams
    }

    /// Every registered stream, in registration order.
    pub fn streams(&self) -> impl Iterator<Item = &S> {
        self.routes.iter().map(|r| &r.stream)
    }

    #[must_use]
    pub fn cached_origins(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or_default()
    }
}
