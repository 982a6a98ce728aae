//! Query dispatch: pick exactly one backend for a query.
//!
//! Every backend's pattern is tested against the whole query text. A single
//! match wins, no match falls back to the default backend, and more than one
//! match is an error; the scan never stops at the first hit.

use crate::error::{RouterError, RouterResult};
use crate::router::backend::Backend;
use crate::router::registry::Registry;
use tracing::debug;

/// Select the backend for `query`.
pub fn select<'r>(query: &str, registry: &'r Registry) -> RouterResult<&'r Backend> {
    let index = select_index(query, registry)?;
    registry
        .at(index)
        .ok_or_else(|| RouterError::NoMatch {
            query: query.to_string(),
        })
}

/// Select the registry position of the backend for `query`.
pub fn select_index(query: &str, registry: &Registry) -> RouterResult<usize> {
    let matched: Vec<usize> = registry
        .iter()
        .enumerate()
        .filter(|(_, backend)| backend.matches(query))
        .map(|(i, _)| i)
        .collect();

    match matched.as_slice() {
        [] => match registry.default_index() {
            Some(i) => {
                debug!(backend = %backend_name(registry, i), "No pattern matched, using default backend");
                Ok(i)
            }
            None => {
                debug!("No pattern matched and no default backend");
                Err(RouterError::NoMatch {
                    query: query.to_string(),
                })
            }
        },
        [only] => {
            debug!(backend = %backend_name(registry, *only), "Query routed");
            Ok(*only)
        }
        many => {
            let backends: Vec<String> = many
                .iter()
                .map(|i| backend_name(registry, *i).to_string())
                .collect();
            debug!(backends = ?backends, "Query matched several backends");
            Err(RouterError::AmbiguousMatch {
                query: query.to_string(),
                backends,
            })
        }
    }
}

fn backend_name(registry: &Registry, index: usize) -> &str {
    registry.at(index).map(Backend::name).unwrap_or_default()
}
