//! IP reputation features: address class, hosting/Tor membership, novelty vs history.

use super::{FeatureDetail, FeatureVector, ScoringContext};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;

const DATACENTER_RANGES: &[&str] = &[
    "104.16.0.0/12",   // Cloudflare
    "172.64.0.0/13",   // Cloudflare
    "162.158.0.0/15",  // Cloudflare
    "198.41.128.0/17", // Cloudflare
    "35.180.0.0/12",   // AWS
    "52.0.0.0/6",      // AWS
    "34.64.0.0/10",    // Google Cloud
    "35.184.0.0/13",   // Google Cloud
    "40.112.0.0/13",   // Azure
    "65.52.0.0/14",    // Azure
];

const TOR_EXIT_RANGES: &[&str] = &["198.96.0.0/16", "199.87.0.0/16", "176.10.0.0/16", "46.165.0.0/16"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpType {
    Private,
    Datacenter,
    Tor,
    Residential,
    Invalid,
}

/// Pre-fetched reputation table. Lookups are in-memory only.
#[derive(Debug, Clone)]
pub struct IpIntel {
    datacenter: Vec<IpNetwork>,
    tor_exits: Vec<IpNetwork>,
}

impl IpIntel {
    pub fn new(datacenter: Vec<IpNetwork>, tor_exits: Vec<IpNetwork>) -> Self {
        Self { datacenter, tor_exits }
    }

    /// Parse CIDR strings; the first malformed entry is returned as an error.
    pub fn from_cidrs(datacenter: &[&str], tor_exits: &[&str]) -> Result<Self, ipnetwork::IpNetworkError> {
        let parse = |list: &[&str]| list.iter().map(|c| c.parse::<IpNetwork>()).collect::<Result<Vec<_>, _>>();
        Ok(Self::new(parse(datacenter)?, parse(tor_exits)?))
    }

    pub fn classify(&self, ip: IpAddr) -> IpType {
        if is_private(ip) {
            IpType::Private
        } else if self.datacenter.iter().any(|n| n.contains(ip)) {
            IpType::Datacenter
        } else if self.tor_exits.iter().any(|n| n.contains(ip)) {
            IpType::Tor
        } else {
            IpType::Residential
        }
    }
}

impl Default for IpIntel {
    fn default() -> Self {
        let parse = |list: &[&str]| -> Vec<IpNetwork> { list.iter().filter_map(|c| c.parse().ok()).collect() };
        Self::new(parse(DATACENTER_RANGES), parse(TOR_EXIT_RANGES))
    }
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        // 240.0.0.0/4, excluding the limited broadcast address
        IpAddr::V4(v4) => v4.octets()[0] >= 240 && !v4.is_broadcast(),
        IpAddr::V6(v6) => v6.is_unspecified(),
    }
}

fn numeric_normalized(ip: IpAddr) -> f64 {
    match ip {
        IpAddr::V4(v4) => u32::from(v4) as f64 / u32::MAX as f64,
        IpAddr::V6(v6) => u128::from(v6) as f64 / u128::MAX as f64,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpFeatures {
    pub ip_type: Option<IpType>,
    pub is_new_ip: bool,
    pub is_datacenter: bool,
    pub is_tor: bool,
    pub is_private: bool,
    pub is_suspicious_type: bool,
    pub historical_ip_count: usize,
    pub numeric_normalized: f64,
    pub is_ipv6: bool,
    pub is_reserved: bool,
    pub is_multicast: bool,
}

impl IpFeatures {
    pub fn extract(ctx: &ScoringContext, intel: &IpIntel) -> Self {
        // Parsed so that equivalent spellings (`::1`, `0:0::1`) are the same address.
        let historical: HashSet<IpAddr> = ctx.history.iter().filter_map(|h| h.ip.parse().ok()).collect();
        let parsed = ctx.session.ip.parse::<IpAddr>();
        let mut f = IpFeatures {
            is_new_ip: parsed.as_ref().map_or(true, |ip| !historical.contains(ip)),
            historical_ip_count: historical.len(),
            ..Default::default()
        };

        let Ok(ip) = parsed else {
            f.ip_type = Some(IpType::Invalid);
            return f;
        };
        let ip_type = intel.classify(ip);
        f.ip_type = Some(ip_type);
        f.is_datacenter = ip_type == IpType::Datacenter;
        f.is_tor = ip_type == IpType::Tor;
        f.is_private = ip_type == IpType::Private;
        f.is_suspicious_type = matches!(ip_type, IpType::Datacenter | IpType::Tor);
        f.numeric_normalized = numeric_normalized(ip);
        f.is_ipv6 = ip.is_ipv6();
        f.is_reserved = is_reserved(ip);
        f.is_multicast = ip.is_multicast();
        f
    }

    /// Encode to the 10-dim model input
    pub fn to_vector(&self) -> Vec<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        vec![
            flag(self.is_new_ip),
            flag(self.is_datacenter),
            flag(self.is_tor),
            flag(self.is_private),
            flag(self.is_suspicious_type),
            (self.historical_ip_count as f32 / 10.0).min(1.0),
            self.numeric_normalized as f32,
            flag(self.is_ipv6),
            flag(self.is_reserved),
            flag(self.is_multicast),
        ]
    }
}

pub fn extract(ctx: &ScoringContext, intel: &IpIntel) -> FeatureVector {
    let features = IpFeatures::extract(ctx, intel);
    FeatureVector {
        values: features.to_vector(),
        detail: FeatureDetail::Ip(features),
    }
}
