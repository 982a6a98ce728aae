//! The fixed, ordered set of backends plus the optional default.

use crate::error::{RouterError, RouterResult};
use crate::models::BackendInfo;
use crate::router::backend::Backend;
use std::collections::HashMap;
use tracing::{info, warn};

/// Ordered backends with a name index.
///
/// Membership never changes after [`Registry::build`]; only the default does.
/// The default is held as an index into `backends`.
#[derive(Debug)]
pub struct Registry {
    backends: Vec<Backend>,
    index: HashMap<String, usize>,
    default: Option<usize>,
}

impl Registry {
    /// Build a registry, closing every backend if the set is invalid.
    ///
    /// Fails with `DuplicateBackend` when two backends share a name and with
    /// `UnknownBackend` when `default` names no backend.
    pub async fn build(mut backends: Vec<Backend>, default: Option<&str>) -> RouterResult<Self> {
        let mut index = HashMap::with_capacity(backends.len());
        let mut problem = None;
        for (i, backend) in backends.iter().enumerate() {
            if index.insert(backend.name().to_string(), i).is_some() {
                problem = Some(RouterError::DuplicateBackend {
                    name: backend.name().to_string(),
                });
                break;
            }
        }

        let default = match (problem.is_none(), default) {
            (true, Some(name)) => match index.get(name) {
                Some(i) => Some(*i),
                None => {
                    problem = Some(RouterError::unknown_backend(name));
                    None
                }
            },
            _ => None,
        };

        if let Some(err) = problem {
            close_all(&mut backends).await;
            return Err(err);
        }

        info!(
            backends = backends.len(),
            default = ?default.map(|i: usize| backends[i].name()),
            "Backend registry ready"
        );
        Ok(Self {
            backends,
            index,
            default,
        })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }

    /// Backends in registry order, for sweeps that touch every connection.
    pub fn backends_mut(&mut self) -> &mut [Backend] {
        &mut self.backends
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Backend> {
        self.position(name).map(|i| &self.backends[i])
    }

    pub fn at(&self, index: usize) -> Option<&Backend> {
        self.backends.get(index)
    }

    pub fn at_mut(&mut self, index: usize) -> Option<&mut Backend> {
        self.backends.get_mut(index)
    }

    pub fn default_index(&self) -> Option<usize> {
        self.default
    }

    pub fn default_backend(&self) -> Option<&Backend> {
        self.default.map(|i| &self.backends[i])
    }

    /// Make `name` the default. Unknown names leave the default unchanged.
    pub fn set_default(&mut self, name: &str) -> RouterResult<()> {
        let i = self
            .position(name)
            .ok_or_else(|| RouterError::unknown_backend(name))?;
        self.default = Some(i);
        info!(backend = %name, "Default backend set");
        Ok(())
    }

    pub fn unset_default(&mut self) {
        self.default = None;
        info!("Default backend cleared");
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(Backend::name).collect()
    }

    pub fn summary(&self) -> Vec<BackendInfo> {
        self.backends
            .iter()
            .enumerate()
            .map(|(i, b)| b.info(self.default == Some(i)))
            .collect()
    }
}

async fn close_all(backends: &mut [Backend]) {
    for backend in backends.iter_mut() {
        if let Err(e) = backend.connection().close().await {
            warn!(backend = %backend.name(), error = %e, "Failed to close backend");
        }
    }
}
