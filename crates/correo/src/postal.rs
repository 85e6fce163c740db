//! Argentine postal codes and province codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A four-digit Argentine postal code, as the carrier expects it.
///
/// Accepts the legacy numeric form (`1425`) and the 8-character CPA
/// (`C1425ABC`); the CPA's province letter and block suffix are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

/// Why a postal code was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid postal code {0:?}: expected 4 digits or a CPA like C1425ABC")]
pub struct PostalCodeError(pub String);

impl PostalCode {
    /// Parse and normalize a postal code.
    ///
    /// # Errors
    ///
    /// Returns [`PostalCodeError`] when the input is neither 4 digits nor a
    /// well-formed CPA.
    pub fn parse(input: &str) -> Result<Self, PostalCodeError> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        let bytes = compact.as_bytes();

        let digits = match bytes {
            [a, b, c, d] if [a, b, c, d].iter().all(|x| x.is_ascii_digit()) => compact.as_str(),
            [p, rest @ ..]
                if rest.len() == 7
                    && ProvinceCode::from_letter(char::from(*p)).is_some()
                    && rest.iter().take(4).all(u8::is_ascii_digit)
                    && rest.iter().skip(4).all(u8::is_ascii_alphabetic) =>
            {
                compact.get(1..5).unwrap_or_default()
            }
            _ => return Err(PostalCodeError(input.to_string())),
        };

        if digits.starts_with('0') {
            return Err(PostalCodeError(input.to_string()));
        }
        Ok(Self(digits.to_string()))
    }

    /// The four digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = PostalCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for PostalCode {
    type Err = PostalCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Argentine province, identified by its ISO 3166-2:AR letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProvinceCode {
    Salta,
    BuenosAires,
    CiudadAutonoma,
    SanLuis,
    EntreRios,
    LaRioja,
    SantiagoDelEstero,
    Chaco,
    SanJuan,
    Catamarca,
    LaPampa,
    Mendoza,
    Misiones,
    Formosa,
    Neuquen,
    RioNegro,
    SantaFe,
    Tucuman,
    Chubut,
    TierraDelFuego,
    Corrientes,
    Cordoba,
    Jujuy,
    SantaCruz,
}

impl ProvinceCode {
    /// Every province, ordered by letter.
    pub const ALL: [Self; 24] = [
        Self::Salta,
        Self::BuenosAires,
        Self::CiudadAutonoma,
        Self::SanLuis,
        Self::EntreRios,
        Self::LaRioja,
        Self::SantiagoDelEstero,
        Self::Chaco,
        Self::SanJuan,
        Self::Catamarca,
        Self::LaPampa,
        Self::Mendoza,
        Self::Misiones,
        Self::Formosa,
        Self::Neuquen,
        Self::RioNegro,
        Self::SantaFe,
        Self::Tucuman,
        Self::Chubut,
        Self::TierraDelFuego,
        Self::Corrientes,
        Self::Cordoba,
        Self::Jujuy,
        Self::SantaCruz,
    ];

    /// The ISO letter the carrier uses.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Salta => 'A',
            Self::BuenosAires => 'B',
            Self::CiudadAutonoma => 'C',
            Self::SanLuis => 'D',
            Self::EntreRios => 'E',
            Self::LaRioja => 'F',
            Self::SantiagoDelEstero => 'G',
            Self::Chaco => 'H',
            Self::SanJuan => 'J',
            Self::Catamarca => 'K',
            Self::LaPampa => 'L',
            Self::Mendoza => 'M',
            Self::Misiones => 'N',
            Self::Formosa => 'P',
            Self::Neuquen => 'Q',
            Self::RioNegro => 'R',
            Self::SantaFe => 'S',
            Self::Tucuman => 'T',
            Self::Chubut => 'U',
            Self::TierraDelFuego => 'V',
            Self::Corrientes => 'W',
            Self::Cordoba => 'X',
            Self::Jujuy => 'Y',
            Self::SantaCruz => 'Z',
        }
    }

    /// Human-readable province name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Salta => "Salta",
            Self::BuenosAires => "Buenos Aires",
            Self::CiudadAutonoma => "Ciudad Autónoma de Buenos Aires",
            Self::SanLuis => "San Luis",
            Self::EntreRios => "Entre Ríos",
            Self::LaRioja => "La Rioja",
            Self::SantiagoDelEstero => "Santiago del Estero",
            Self::Chaco => "Chaco",
            Self::SanJuan => "San Juan",
            Self::Catamarca => "Catamarca",
            Self::LaPampa => "La Pampa",
            Self::Mendoza => "Mendoza",
            Self::Misiones => "Misiones",
            Self::Formosa => "Formosa",
            Self::Neuquen => "Neuquén",
            Self::RioNegro => "Río Negro",
            Self::SantaFe => "Santa Fe",
            Self::Tucuman => "Tucumán",
            Self::Chubut => "Chubut",
            Self::TierraDelFuego => "Tierra del Fuego",
            Self::Corrientes => "Corrientes",
            Self::Cordoba => "Córdoba",
            Self::Jujuy => "Jujuy",
            Self::SantaCruz => "Santa Cruz",
        }
    }

    /// Look up a province by its letter (case-insensitive).
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        Self::ALL.into_iter().find(|p| p.letter() == upper)
    }
}

impl fmt::Display for ProvinceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl std::str::FromStr for ProvinceCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Self::from_letter(letter),
            _ => None,
        }
        .ok_or_else(|| format!("invalid province code: {trimmed:?}"))
    }
}

impl TryFrom<String> for ProvinceCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProvinceCode> for String {
    fn from(code: ProvinceCode) -> Self {
        code.letter().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1425", "1425")]
    #[case(" 5000 ", "5000")]
    #[case("C1425ABC", "1425")]
    #[case("x5000abc", "5000")]
    #[case("B 1900 AAA", "1900")]
    fn test_postal_code_normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(PostalCode::parse(input).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("142")]
    #[case("14255")]
    #[case("0425")]
    #[case("I1425ABC")]
    #[case("C1425AB1")]
    #[case("ABCD")]
    fn test_postal_code_rejects(#[case] input: &str) {
        assert!(PostalCode::parse(input).is_err());
    }

    #[test]
    fn test_province_letters_are_unique() {
        let mut letters: Vec<char> = ProvinceCode::ALL.iter().map(|p| p.letter()).collect();
        letters.dedup();
        assert_eq!(letters.len(), 24);
        assert!(!letters.contains(&'I'));
        assert!(!letters.contains(&'O'));
    }

    #[test]
    fn test_province_parse_and_serde() {
        assert_eq!("x".parse::<ProvinceCode>().unwrap(), ProvinceCode::Cordoba);
        assert!("XX".parse::<ProvinceCode>().is_err());
        assert!("I".parse::<ProvinceCode>().is_err());
        assert_eq!(
            serde_json::to_string(&ProvinceCode::CiudadAutonoma).unwrap(),
            "\"C\""
        );
        let parsed: ProvinceCode = serde_json::from_str("\"b\"").unwrap();
        assert_eq!(parsed, ProvinceCode::BuenosAires);
    }
}
