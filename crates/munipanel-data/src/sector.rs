//! Economic sectors of development-bank disbursements.
//!
//! Disbursement records carry a broad CNAE sector and a subsector. Public
//! utilities and construction are booked under trade-and-services by the
//! bank but belong to industry in the national accounts, so they are
//! reclassified before aggregation.

use crate::resolve::strip_diacritics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad sector as published by the bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawSector {
    /// Agropecuária
    Agriculture,
    /// Indústria extrativa
    Extractive,
    /// Indústria de transformação
    Manufacturing,
    /// Comércio e serviços
    TradeAndServices,
    /// Anything else
    Other,
}

impl RawSector {
    /// Parse a published sector label, ignoring case and accents.
    pub fn parse(label: &str) -> Self {
        match canonical(label).as_str() {
            "AGROPECUARIA" => Self::Agriculture,
            "INDUSTRIA EXTRATIVA" => Self::Extractive,
            "INDUSTRIA DE TRANSFORMACAO" => Self::Manufacturing,
            "COMERCIO E SERVICOS" => Self::TradeAndServices,
            _ => Self::Other,
        }
    }
}

/// Subsector tags relevant for reclassification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subsector {
    /// Eletricidade e gás
    ElectricityAndGas,
    /// Água, esgoto e lixo
    WaterSewageWaste,
    /// Construção
    Construction,
    /// Any other subsector
    Other,
}

impl Subsector {
    /// Parse a published subsector label, ignoring case and accents.
    pub fn parse(label: &str) -> Self {
        match canonical(label).as_str() {
            "ELETRICIDADE E GAS" => Self::ElectricityAndGas,
            "AGUA, ESGOTO E LIXO" => Self::WaterSewageWaste,
            "CONSTRUCAO" => Self::Construction,
            _ => Self::Other,
        }
    }
}

/// Sector after reclassification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    /// Agriculture and livestock
    Agriculture,
    /// Extractive industry
    Extractive,
    /// Manufacturing industry
    Manufacturing,
    /// Public utilities (electricity, gas, water, sewage, waste)
    PublicUtilities,
    /// Construction industry
    Construction,
    /// Remaining trade and services
    TradeAndServices,
    /// Unclassified
    Other,
}

/// Aggregation bucket of a sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectorScope {
    /// Industrial value added
    Industry,
    /// Agricultural value added
    Agriculture,
    /// Neither
    Other,
}

impl Sector {
    /// Reclassify a raw sector given its subsector.
    pub const fn classify(raw: RawSector, subsector: Subsector) -> Self {
        match (raw, subsector) {
            (RawSector::Agriculture, _) => Self::Agriculture,
            (RawSector::Extractive, _) => Self::Extractive,
            (RawSector::Manufacturing, _) => Self::Manufacturing,
            (RawSector::TradeAndServices, Subsector::ElectricityAndGas)
            | (RawSector::TradeAndServices, Subsector::WaterSewageWaste) => Self::PublicUtilities,
            (RawSector::TradeAndServices, Subsector::Construction) => Self::Construction,
            (RawSector::TradeAndServices, Subsector::Other) => Self::TradeAndServices,
            (RawSector::Other, _) => Self::Other,
        }
    }

    /// Classify directly from published labels.
    pub fn from_labels(sector: &str, subsector: &str) -> Self {
        Self::classify(RawSector::parse(sector), Subsector::parse(subsector))
    }

    /// Aggregation bucket.
    pub const fn scope(&self) -> SectorScope {
        match self {
            Self::Extractive | Self::Manufacturing | Self::PublicUtilities | Self::Construction => {
                SectorScope::Industry
            }
            Self::Agriculture => SectorScope::Agriculture,
            Self::TradeAndServices | Self::Other => SectorScope::Other,
        }
    }

    /// Returns the sector name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Agriculture => "agriculture",
            Self::Extractive => "extractive",
            Self::Manufacturing => "manufacturing",
            Self::PublicUtilities => "public_utilities",
            Self::Construction => "construction",
            Self::TradeAndServices => "trade_and_services",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn canonical(label: &str) -> String {
    strip_diacritics(label)
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
