//! Row models for the four ordered collections of the admin dashboard.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RowId;

/// Remote column holding an entity's display position.
pub const POSITION_COLUMN: &str = "sort_order";

/// The collection kinds managed by the dashboard.
///
/// Each kind is an independent ordered collection with its own store and gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Skills,
    Experiences,
    Education,
    Certificates,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::Skills,
        CollectionKind::Experiences,
        CollectionKind::Education,
        CollectionKind::Certificates,
    ];

    /// Default remote table name
    pub fn table_name(&self) -> &'static str {
        match self {
            CollectionKind::Skills => "skills",
            CollectionKind::Experiences => "experiences",
            CollectionKind::Education => "education",
            CollectionKind::Certificates => "certificates",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skills" | "skill" => Ok(CollectionKind::Skills),
            "experiences" | "experience" => Ok(CollectionKind::Experiences),
            "education" => Ok(CollectionKind::Education),
            "certificates" | "certificate" => Ok(CollectionKind::Certificates),
            other => Err(format!("unknown collection: {}", other)),
        }
    }
}

/// Tech-stack entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: RowId,
    pub name: String,
    #[serde(rename = "sort_order")]
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub id: RowId,
    /// Company or organization name
    pub title: String,
    /// Job title or role
    pub summary: String,
    pub published_at: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// Markdown body
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "sort_order")]
    pub position: i64,
}

/// Same shape as [`Experience`]: institution in `title`, degree in `summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub id: RowId,
    pub title: String,
    pub summary: String,
    pub published_at: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "sort_order")]
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: RowId,
    pub title: String,
    /// Issuer, e.g. "Coursera"
    pub company: String,
    pub issued_date: String,
    #[serde(default)]
    pub certificate_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "sort_order")]
    pub position: i64,
}

/// Group certificates by issuing company.
///
/// Groups appear in the order their first certificate appears in `certificates`,
/// and each group keeps the relative order of the input sequence.
pub fn group_by_company(certificates: &[Certificate]) -> Vec<(String, Vec<Certificate>)> {
    let mut groups: Vec<(String, Vec<Certificate>)> = Vec::new();
    for cert in certificates {
        match groups.iter_mut().find(|(company, _)| *company == cert.company) {
            Some((_, certs)) => certs.push(cert.clone()),
            None => groups.push((cert.company.clone(), vec![cert.clone()])),
        }
    }
    groups
}
