pub mod stream;
pub mod youtube;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::error::ResolveError;

pub use stream::{ByteStream, StreamSource};
pub use youtube::YtDlpClient;

/// Representa un track resuelto y reproducible.
///
/// Immutable once resolved; the queue entry holding it owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    url: String,
    duration: Duration,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>, duration: Duration) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Lookup primitives of the external resolver.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackLookup: Send + Sync {
    /// Interpreta `reference` directamente como algo reproducible.
    async fn lookup(&self, reference: &str) -> Result<Track, ResolveError>;

    /// Busca por nombre y devuelve la referencia del mejor candidato.
    async fn search(&self, name: &str) -> Result<String, ResolveError>;
}

/// Media Resolver: direct lookup first, then a single search-by-name
/// fallback whose candidate is looked up again.
///
/// Network bound; no retries beyond the fallback.
#[derive(Clone)]
pub struct MediaResolver {
    lookup: Arc<dyn TrackLookup>,
}

impl MediaResolver {
    pub fn new(lookup: Arc<dyn TrackLookup>) -> Self {
        Self { lookup }
    }

    pub async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound(String::new()));
        }

        match self.lookup.lookup(query).await {
            Ok(track) => {
                info!("🎯 Resuelto directamente: {}", track.title());
                return Ok(track);
            }
            Err(e) => debug!("Lookup directo falló para `{}`: {}", query, e),
        }

        let candidate = self
            .lookup
            .search(query)
            .await
            .map_err(|_| ResolveError::NotFound(query.to_string()))?;
        debug!("🔍 Candidato para `{}`: {}", query, candidate);

        let track = self
            .lookup
            .lookup(&candidate)
            .await
            .map_err(|_| ResolveError::NotFound(query.to_string()))?;
        info!("🔍 Resuelto por búsqueda: {} ({})", track.title(), track.url());

        Ok(track)
    }
}
