//! Brazilian federative units (UF) and their IBGE numeric prefixes.

use crate::resolve::strip_diacritics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Brazilian federative units (26 states plus the Federal District).
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum State {
    /// Rondônia
    RO,
    /// Acre
    AC,
    /// Amazonas
    AM,
    /// Roraima
    RR,
    /// Pará
    PA,
    /// Amapá
    AP,
    /// Tocantins
    TO,
    /// Maranhão
    MA,
    /// Piauí
    PI,
    /// Ceará
    CE,
    /// Rio Grande do Norte
    RN,
    /// Paraíba
    PB,
    /// Pernambuco
    PE,
    /// Alagoas
    AL,
    /// Sergipe
    SE,
    /// Bahia
    BA,
    /// Minas Gerais
    MG,
    /// Espírito Santo
    ES,
    /// Rio de Janeiro
    RJ,
    /// São Paulo
    SP,
    /// Paraná
    PR,
    /// Santa Catarina
    SC,
    /// Rio Grande do Sul
    RS,
    /// Mato Grosso do Sul
    MS,
    /// Mato Grosso
    MT,
    /// Goiás
    GO,
    /// Distrito Federal
    DF,
}

impl State {
    /// Returns all federative units in IBGE code order.
    pub fn all() -> Vec<Self> {
        vec![
            Self::RO,
            Self::AC,
            Self::AM,
            Self::RR,
            Self::PA,
            Self::AP,
            Self::TO,
            Self::MA,
            Self::PI,
            Self::CE,
            Self::RN,
            Self::PB,
            Self::PE,
            Self::AL,
            Self::SE,
            Self::BA,
            Self::MG,
            Self::ES,
            Self::RJ,
            Self::SP,
            Self::PR,
            Self::SC,
            Self::RS,
            Self::MS,
            Self::MT,
            Self::GO,
            Self::DF,
        ]
    }

    /// Returns the IBGE state code (first two digits of a municipality code).
    pub const fn code(&self) -> u8 {
        match self {
            Self::RO => 11,
            Self::AC => 12,
            Self::AM => 13,
            Self::RR => 14,
            Self::PA => 15,
            Self::AP => 16,
            Self::TO => 17,
            Self::MA => 21,
            Self::PI => 22,
            Self::CE => 23,
            Self::RN => 24,
            Self::PB => 25,
            Self::PE => 26,
            Self::AL => 27,
            Self::SE => 28,
            Self::BA => 29,
            Self::MG => 31,
            Self::ES => 32,
            Self::RJ => 33,
            Self::SP => 35,
            Self::PR => 41,
            Self::SC => 42,
            Self::RS => 43,
            Self::MS => 50,
            Self::MT => 51,
            Self::GO => 52,
            Self::DF => 53,
        }
    }

    /// Returns the two-letter abbreviation.
    pub const fn abbreviation(&self) -> &'static str {
        match self {
            Self::RO => "RO",
            Self::AC => "AC",
            Self::AM => "AM",
            Self::RR => "RR",
            Self::PA => "PA",
            Self::AP => "AP",
            Self::TO => "TO",
            Self::MA => "MA",
            Self::PI => "PI",
            Self::CE => "CE",
            Self::RN => "RN",
            Self::PB => "PB",
            Self::PE => "PE",
            Self::AL => "AL",
            Self::SE => "SE",
            Self::BA => "BA",
            Self::MG => "MG",
            Self::ES => "ES",
            Self::RJ => "RJ",
            Self::SP => "SP",
            Self::PR => "PR",
            Self::SC => "SC",
            Self::RS => "RS",
            Self::MS => "MS",
            Self::MT => "MT",
            Self::GO => "GO",
            Self::DF => "DF",
        }
    }

    /// Returns the full upper-case name without diacritics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RO => "RONDONIA",
            Self::AC => "ACRE",
            Self::AM => "AMAZONAS",
            Self::RR => "RORAIMA",
            Self::PA => "PARA",
            Self::AP => "AMAPA",
            Self::TO => "TOCANTINS",
            Self::MA => "MARANHAO",
            Self::PI => "PIAUI",
            Self::CE => "CEARA",
            Self::RN => "RIO GRANDE DO NORTE",
            Self::PB => "PARAIBA",
            Self::PE => "PERNAMBUCO",
            Self::AL => "ALAGOAS",
            Self::SE => "SERGIPE",
            Self::BA => "BAHIA",
            Self::MG => "MINAS GERAIS",
            Self::ES => "ESPIRITO SANTO",
            Self::RJ => "RIO DE JANEIRO",
            Self::SP => "SAO PAULO",
            Self::PR => "PARANA",
            Self::SC => "SANTA CATARINA",
            Self::RS => "RIO GRANDE DO SUL",
            Self::MS => "MATO GROSSO DO SUL",
            Self::MT => "MATO GROSSO",
            Self::GO => "GOIAS",
            Self::DF => "DISTRITO FEDERAL",
        }
    }

    /// Parse a state from its IBGE code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            11 => Some(Self::RO),
            12 => Some(Self::AC),
            13 => Some(Self::AM),
            14 => Some(Self::RR),
            15 => Some(Self::PA),
            16 => Some(Self::AP),
            17 => Some(Self::TO),
            21 => Some(Self::MA),
            22 => Some(Self::PI),
            23 => Some(Self::CE),
            24 => Some(Self::RN),
            25 => Some(Self::PB),
            26 => Some(Self::PE),
            27 => Some(Self::AL),
            28 => Some(Self::SE),
            29 => Some(Self::BA),
            31 => Some(Self::MG),
            32 => Some(Self::ES),
            33 => Some(Self::RJ),
            35 => Some(Self::SP),
            41 => Some(Self::PR),
            42 => Some(Self::SC),
            43 => Some(Self::RS),
            50 => Some(Self::MS),
            51 => Some(Self::MT),
            52 => Some(Self::GO),
            53 => Some(Self::DF),
            _ => None,
        }
    }

    /// Derive the state from a municipality code (its first two digits).
    pub fn from_municipality_code(code: &str) -> Option<Self> {
        let prefix = code.trim().get(..2)?;
        prefix.parse::<u8>().ok().and_then(Self::from_code)
    }

    /// Parse a state from its two-letter abbreviation (case-insensitive).
    pub fn from_abbreviation(abbreviation: &str) -> Option<Self> {
        let wanted = abbreviation.trim().to_uppercase();
        Self::all()
            .into_iter()
            .find(|s| s.abbreviation() == wanted)
    }

    /// Parse a state from its full name, ignoring case, accents and padding.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = strip_diacritics(name)
            .to_uppercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        Self::all().into_iter().find(|s| s.name() == wanted)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}
