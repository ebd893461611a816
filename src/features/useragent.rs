//! User-agent authenticity features: bot signatures, browser/OS family, string statistics.

use super::{FeatureDetail, FeatureVector, ScoringContext};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

const BOT_PATTERNS: &[&str] = &[
    "bot", "crawler", "spider", "scraper", "curl", "wget", "python", "java", "ruby", "perl", "php", "node",
    "headless", "phantom", "selenium", "puppeteer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserFamily {
    Chrome,
    Firefox,
    Safari,
    Edge,
    Opera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Windows,
    Mac,
    Linux,
    Android,
    Ios,
}

struct Patterns {
    bot: Regex,
    edge: Regex,
    opera: Regex,
    chrome: Regex,
    firefox: Regex,
    safari: Regex,
}

fn patterns() -> &'static Patterns {
    static P: OnceLock<Patterns> = OnceLock::new();
    P.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static regex");
        Patterns {
            bot: re(&format!("(?i)(?:{})", BOT_PATTERNS.join("|"))),
            edge: re(r"Edg(?:e|A|iOS)?/([\d.]+)"),
            opera: re(r"OPR/([\d.]+)"),
            chrome: re(r"(?:Chrome|CriOS)/([\d.]+)"),
            firefox: re(r"(?:Firefox|FxiOS)/([\d.]+)"),
            safari: re(r"Version/([\d.]+).*Safari/"),
        }
    })
}

fn browser(ua: &str) -> Option<(BrowserFamily, String)> {
    let p = patterns();
    // Order matters: Edge and Opera also advertise Chrome, Chrome also advertises Safari.
    let candidates = [
        (&p.edge, BrowserFamily::Edge),
        (&p.opera, BrowserFamily::Opera),
        (&p.chrome, BrowserFamily::Chrome),
        (&p.firefox, BrowserFamily::Firefox),
        (&p.safari, BrowserFamily::Safari),
    ];
    candidates.iter().find_map(|(re, family)| {
        re.captures(ua)
            .and_then(|c| c.get(1))
            .map(|m| (*family, m.as_str().to_string()))
    })
}

fn os(ua: &str) -> Option<OsFamily> {
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        Some(OsFamily::Ios)
    } else if ua.contains("Android") {
        Some(OsFamily::Android)
    } else if ua.contains("Windows") {
        Some(OsFamily::Windows)
    } else if ua.contains("Mac OS X") || ua.contains("Macintosh") {
        Some(OsFamily::Mac)
    } else if ua.contains("Linux") || ua.contains("X11") || ua.contains("CrOS") {
        Some(OsFamily::Linux)
    } else {
        None
    }
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(text: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut len = 0usize;
    for ch in text.chars() {
        *counts.entry(ch).or_default() += 1;
        len += 1;
    }
    if len == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / len as f64;
            -p * p.log2()
        })
        .sum()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAgentFeatures {
    /// Length in characters
    pub length: usize,
    pub is_bot: bool,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_pc: bool,
    pub browser: Option<BrowserFamily>,
    pub browser_version: Option<String>,
    pub os: Option<OsFamily>,
    /// Bot signature or unrecognised browser/OS
    pub is_suspicious: bool,
    pub entropy: f64,
    pub special_char_ratio: f64,
}

impl UserAgentFeatures {
    pub fn from_user_agent(ua: &str) -> Self {
        let length = ua.chars().count();
        let is_bot = patterns().bot.is_match(ua);
        let parsed = browser(ua);
        let os = os(ua);

        let is_tablet = ua.contains("iPad") || ua.contains("Tablet") || (ua.contains("Android") && !ua.contains("Mobile"));
        let is_mobile = !is_tablet && (ua.contains("Mobile") || ua.contains("iPhone"));
        let is_pc = !is_mobile && !is_tablet && matches!(os, Some(OsFamily::Windows | OsFamily::Mac | OsFamily::Linux));

        let unrecognised = parsed.is_none() || os.is_none();
        let special = ua.chars().filter(|c| !c.is_alphanumeric()).count();
        UserAgentFeatures {
            length,
            is_bot,
            is_mobile,
            is_tablet,
            is_pc,
            browser: parsed.as_ref().map(|(f, _)| *f),
            browser_version: parsed.map(|(_, v)| v),
            os,
            is_suspicious: is_bot || unrecognised,
            entropy: shannon_entropy(ua),
            special_char_ratio: special as f64 / length.max(1) as f64,
        }
    }

    pub fn extract(ctx: &ScoringContext) -> Self {
        Self::from_user_agent(&ctx.session.user_agent)
    }

    /// Encode to the 18-dim model input
    pub fn to_vector(&self) -> Vec<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let is_browser = |f: BrowserFamily| flag(self.browser == Some(f));
        let is_os = |f: OsFamily| flag(self.os == Some(f));
        vec![
            (self.length as f32 / 500.0).min(1.0),
            flag(self.is_bot),
            flag(self.is_mobile),
            flag(self.is_tablet),
            flag(self.is_pc),
            is_browser(BrowserFamily::Chrome),
            is_browser(BrowserFamily::Firefox),
            is_browser(BrowserFamily::Safari),
            is_browser(BrowserFamily::Edge),
            is_os(OsFamily::Windows),
            is_os(OsFamily::Mac),
            is_os(OsFamily::Linux),
            is_os(OsFamily::Android),
            is_os(OsFamily::Ios),
            flag(self.is_suspicious),
            (self.entropy / 5.0) as f32,
            flag(self.browser_version.is_some()),
            self.special_char_ratio as f32,
        ]
    }
}

pub fn extract(ctx: &ScoringContext) -> FeatureVector {
    let features = UserAgentFeatures::extract(ctx);
    FeatureVector {
        values: features.to_vector(),
        detail: FeatureDetail::UserAgent(features),
    }
}
