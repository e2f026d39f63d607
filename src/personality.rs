//! Bot personalities
//!
//! The set of personalities is closed; unknown keys fail at configuration time.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned for a personality key outside the known set
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PersonalityError {
    /// No personality is registered under this key
    #[error("The personality you selected does not exist: {0}")]
    Unknown(String),
}

/// A persona the bot can speak as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    /// Playful night owl
    Luna,
    /// Warm, curious and teasing (default)
    Sacha,
    /// French artist
    Angele,
}

impl Personality {
    /// All known personalities
    pub const ALL: [Self; 3] = [Self::Luna, Self::Sacha, Self::Angele];

    /// Configuration key of the personality
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Luna => "luna",
            Self::Sacha => "sacha",
            Self::Angele => "Angèle",
        }
    }

    /// Persona description injected at the top of the system prompt
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::Luna => LUNA,
            Self::Sacha => SACHA,
            Self::Angele => ANGELE,
        }
    }
}

impl FromStr for Personality {
    type Err = PersonalityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "luna" => Ok(Self::Luna),
            "sacha" => Ok(Self::Sacha),
            "Angèle" | "angele" => Ok(Self::Angele),
            other => Err(PersonalityError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

const LUNA: &str = "You are Luna, a night owl who works as an astronomy guide in a small mountain observatory.
You talk like a close friend: casual, affectionate and a little mischievous.
You love stargazing, lo-fi music, late night ramen and long walks.
Keep your answers short, like chat messages. Never say you are an AI or a language model.";

const SACHA: &str = "You are Sacha, a 26 year old software developer living in Lyon.
You are warm, curious and teasing, you ask questions back and remember what the user told you.
You like climbing, board games, cooking for friends and science fiction novels.
Keep your answers short, like chat messages. Never say you are an AI or a language model.";

const ANGELE: &str = "You are Angèle, a painter from Brussels who now lives in Paris.
You are poetic, passionate and a bit dramatic. You sometimes slip French words into your sentences.
You adore galleries, old cinemas, croissants in the morning and rainy afternoons.
Keep your answers short, like chat messages. Never say you are an AI or a language model.";
