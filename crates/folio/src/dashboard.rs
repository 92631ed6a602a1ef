//! Dashboard composition root
//!
//! One store per collection kind, each wired to the gateway it was given.
//! Nothing here is global: a frontend builds a `Dashboard` and owns it.

use folio_api::{ApiError, Certificate, CollectionKind, Education, Experience, Skill};
use folio_core::RemoteCollection;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::gateway::MemoryCollection;
use crate::store::OrderedCollectionStore;

/// Gateways for the four collections.
pub struct Gateways {
    pub skills: Arc<dyn RemoteCollection<Skill>>,
    pub experiences: Arc<dyn RemoteCollection<Experience>>,
    pub education: Arc<dyn RemoteCollection<Education>>,
    pub certificates: Arc<dyn RemoteCollection<Certificate>>,
}

impl Gateways {
    /// Empty in-memory gateways.
    pub fn in_memory() -> Self {
        Self {
            skills: Arc::new(MemoryCollection::<Skill>::new()),
            experiences: Arc::new(MemoryCollection::<Experience>::new()),
            education: Arc::new(MemoryCollection::<Education>::new()),
            certificates: Arc::new(MemoryCollection::<Certificate>::new()),
        }
    }
}

/// Row counts per collection, as shown on the overview cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub skills: usize,
    pub experiences: usize,
    pub education: usize,
    pub certificates: usize,
}

impl Overview {
    pub fn count(&self, kind: CollectionKind) -> usize {
        match kind {
            CollectionKind::Skills => self.skills,
            CollectionKind::Experiences => self.experiences,
            CollectionKind::Education => self.education,
            CollectionKind::Certificates => self.certificates,
        }
    }

    pub fn total(&self) -> usize {
        self.skills + self.experiences + self.education + self.certificates
    }
}

pub struct Dashboard {
    pub skills: OrderedCollectionStore<Skill>,
    pub experiences: OrderedCollectionStore<Experience>,
    pub education: OrderedCollectionStore<Education>,
    pub certificates: OrderedCollectionStore<Certificate>,
}

impl Dashboard {
    pub fn new(gateways: Gateways, config: StoreConfig) -> Self {
        Self {
            skills: OrderedCollectionStore::new(gateways.skills, config.clone()),
            experiences: OrderedCollectionStore::new(gateways.experiences, config.clone()),
            education: OrderedCollectionStore::new(gateways.education, config.clone()),
            certificates: OrderedCollectionStore::new(gateways.certificates, config),
        }
    }

    pub fn in_memory(config: StoreConfig) -> Self {
        Self::new(Gateways::in_memory(), config)
    }

    /// Load all four collections concurrently.
    ///
    /// Every load runs to completion; the failures are returned by kind.
    pub async fn load_all(&self) -> Vec<(CollectionKind, ApiError)> {
        let (skills, experiences, education, certificates) = tokio::join!(
            self.skills.load(),
            self.experiences.load(),
            self.education.load(),
            self.certificates.load(),
        );

        let failures: Vec<_> = [
            (CollectionKind::Skills, skills),
            (CollectionKind::Experiences, experiences),
            (CollectionKind::Education, education),
            (CollectionKind::Certificates, certificates),
        ]
        .into_iter()
        .filter_map(|(kind, result)| result.err().map(|err| (kind, err)))
        .collect();

        if failures.is_empty() {
            info!(total = self.overview().total(), "dashboard loaded");
        } else {
            warn!(failed = failures.len(), "dashboard partially loaded");
        }
        failures
    }

    pub fn overview(&self) -> Overview {
        Overview {
            skills: self.skills.len(),
            experiences: self.experiences.len(),
            education: self.education.len(),
            certificates: self.certificates.len(),
        }
    }
}
