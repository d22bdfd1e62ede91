use std::fmt;
use std::str::FromStr;

use poise::ChoiceParameter;

use crate::error::AppError;

/// PC platform shards that publish ranked leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ChoiceParameter)]
pub enum Region {
    #[name = "AS - Asia"]
    PcAs,
    #[name = "EU - Europe"]
    PcEu,
    #[name = "JP - Japan"]
    PcJp,
    #[name = "KRJP - Korea/Japan"]
    PcKrjp,
    #[name = "KAKAO - Kakao"]
    PcKakao,
    #[name = "NA - North America"]
    PcNa,
    #[name = "OC - Oceania"]
    PcOc,
    #[name = "RU - Russia"]
    PcRu,
    #[name = "SA - South America"]
    PcSa,
    #[name = "SEA - South East Asia"]
    PcSea,
}

impl Region {
    pub const ALL: [Region; 10] = [
        Self::PcAs,
        Self::PcEu,
        Self::PcJp,
        Self::PcKrjp,
        Self::PcKakao,
        Self::PcNa,
        Self::PcOc,
        Self::PcRu,
        Self::PcSa,
        Self::PcSea,
    ];

    /// Shard id as used in API paths and stored leaderboard entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PcAs => "pc-as",
            Self::PcEu => "pc-eu",
            Self::PcJp => "pc-jp",
            Self::PcKrjp => "pc-krjp",
            Self::PcKakao => "pc-kakao",
            Self::PcNa => "pc-na",
            Self::PcOc => "pc-oc",
            Self::PcRu => "pc-ru",
            Self::PcSa => "pc-sa",
            Self::PcSea => "pc-sea",
        }
    }

    /// Short uppercase label, e.g. `EU`.
    pub fn label(&self) -> String {
        self.as_str().trim_start_matches("pc-").to_uppercase()
    }
}

impl FromStr for Region {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let short = lower.strip_prefix("pc-").unwrap_or(&lower);
        match short {
            "as" => Ok(Self::PcAs),
            "eu" => Ok(Self::PcEu),
            "jp" => Ok(Self::PcJp),
            "krjp" => Ok(Self::PcKrjp),
            "kakao" => Ok(Self::PcKakao),
            "na" => Ok(Self::PcNa),
            "oc" => Ok(Self::PcOc),
            "ru" => Ok(Self::PcRu),
            "sa" => Ok(Self::PcSa),
            "sea" => Ok(Self::PcSea),
            _ => Err(AppError::InvalidRegion(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
