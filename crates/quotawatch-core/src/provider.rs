//! Provider identity and human-readable quota names

use serde::{Deserialize, Serialize};

/// Quota providers QuotaWatch knows how to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Synthetic (synthetic.new)
    Synthetic,
    /// Z.ai coding plan
    Zai,
    /// GitHub Copilot
    Copilot,
}

impl Provider {
    /// All providers, in display order
    pub const ALL: [Provider; 3] = [Self::Synthetic, Self::Zai, Self::Copilot];

    /// Returns the string representation of the provider
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synthetic => "synthetic",
            Self::Zai => "zai",
            Self::Copilot => "copilot",
        }
    }

    /// Human-readable provider label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Synthetic => "Synthetic",
            Self::Zai => "Z.ai",
            Self::Copilot => "GitHub Copilot",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Self::Synthetic),
            "zai" | "z.ai" => Ok(Self::Zai),
            "copilot" => Ok(Self::Copilot),
            _ => Err(format!("unknown provider: {s}")),
        }
    }
}

/// Human-readable label for a provider quota key.
///
/// Unknown keys are returned unchanged so newly introduced quotas still
/// render.
#[must_use]
pub fn display_name(provider: Provider, key: &str) -> String {
    let known = match (provider, key) {
        (Provider::Copilot, "premium_interactions") => Some("Premium Requests"),
        (Provider::Copilot, "chat") => Some("Chat"),
        (Provider::Copilot, "completions") => Some("Completions"),
        (Provider::Synthetic, "subscription") => Some("Subscription"),
        (Provider::Synthetic, "search") => Some("Search (hourly)"),
        (Provider::Synthetic, "toolcall") => Some("Tool Call Discounts"),
        (Provider::Zai, "tokens") => Some("Tokens"),
        (Provider::Zai, "time") => Some("Tool Time"),
        _ => None,
    };
    known.map_or_else(|| key.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_roundtrip() {
        for provider in Provider::ALL {
            let parsed: Provider = provider.as_str().parse().unwrap();
            assert_eq!(parsed, provider);
        }
        assert_eq!("Z.AI".parse::<Provider>().unwrap(), Provider::Zai);
        assert!("anthropic".parse::<Provider>().is_err());
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(
            display_name(Provider::Copilot, "premium_interactions"),
            "Premium Requests"
        );
        assert_eq!(display_name(Provider::Copilot, "new_bucket"), "new_bucket");
        // Keys are provider-scoped
        assert_eq!(display_name(Provider::Zai, "chat"), "chat");
    }
}
