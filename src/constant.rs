//! Exchange and interval codes
//!
//! The string code of each variant is what gets written to storage, so the
//! codes must never change once data has been saved.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// All known variants
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Storage code
            pub fn value(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok($name::$variant),)+
                    other => Err(StoreError::Decode(format!(
                        "unknown {} code: {:?}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.value())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.value().to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = StoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

string_code_enum! {
    /// Trading venue
    pub enum Exchange {
        // China
        Cffex => "CFFEX",
        Shfe => "SHFE",
        Czce => "CZCE",
        Dce => "DCE",
        Ine => "INE",
        Gfex => "GFEX",
        Sse => "SSE",
        Szse => "SZSE",
        Bse => "BSE",
        Sge => "SGE",
        Cfets => "CFETS",

        // Global
        Smart => "SMART",
        Nyse => "NYSE",
        Nasdaq => "NASDAQ",
        Arca => "ARCA",
        Amex => "AMEX",
        Iex => "IEX",
        Cme => "CME",
        Cbot => "CBOT",
        Cboe => "CBOE",
        Nymex => "NYMEX",
        Comex => "COMEX",
        Globex => "GLOBEX",
        Ice => "ICE",
        Eurex => "EUREX",
        Lme => "LME",
        Sehk => "SEHK",
        Hkfe => "HKFE",
        Sgx => "SGX",
        Tse => "TSE",
        Krx => "KRX",
        Nse => "NSE",
        Bfo => "BFO",
        Nfo => "NFO",
        Mcx => "MCX",

        // Crypto
        Binance => "BINANCE",
        Okx => "OKX",

        // Special
        Otc => "OTC",
        Local => "LOCAL",
        Global => "GLOBAL",
    }
}

string_code_enum! {
    /// Bar interval
    pub enum Interval {
        Minute => "1m",
        Hour => "1h",
        Daily => "d",
        Weekly => "w",
        Tick => "tick",
    }
}
