use serde::{Deserialize, Serialize};

/// Store region. Each region writes to its own order sheet and sends mail
/// from its own sender profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Store {
    Uk,
    Us,
    Eu,
}

impl Store {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UK" | "GB" => Some(Store::Uk),
            "US" => Some(Store::Us),
            "EU" => Some(Store::Eu),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Store::Uk => "UK",
            Store::Us => "US",
            Store::Eu => "EU",
        }
    }

    /// Region implied by an order number prefix (`MLPEU…`, `MLPUS…`, otherwise UK).
    pub fn from_order_number(order_number: &str) -> Self {
        if order_number.contains("MLPEU") {
            Store::Eu
        } else if order_number.contains("MLPUS") {
            Store::Us
        } else {
            Store::Uk
        }
    }
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
