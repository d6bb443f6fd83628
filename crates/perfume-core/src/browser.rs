//! Minimal user-agent lookup for browser-tagged metric names

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserInfo {
    pub name: String,
    pub version: String,
    pub os: Option<String>,
}

lazy_static! {
    /// Ordered: more specific engines first (Edge and Opera also claim Chrome)
    static ref BROWSER_RULES: Vec<(&'static str, Regex)> = vec![
        ("edge", Regex::new(r"Edge?/([0-9._]+)").unwrap()),
        ("opera", Regex::new(r"OPR/([0-9.]+)").unwrap()),
        ("samsung", Regex::new(r"SamsungBrowser/([0-9.]+)").unwrap()),
        ("firefox", Regex::new(r"(?:Firefox|FxiOS)/([0-9.]+)").unwrap()),
        ("chrome", Regex::new(r"(?:Chrome|Chromium|CriOS)/([0-9.]+)").unwrap()),
        ("ios", Regex::new(r"Version/([0-9._]+).*Mobile.*Safari").unwrap()),
        ("safari", Regex::new(r"Version/([0-9._]+).*Safari").unwrap()),
        ("ie", Regex::new(r"Trident/7\.0.*rv:([0-9.]+)").unwrap()),
    ];

    static ref OS_RULES: Vec<(&'static str, Regex)> = vec![
        ("iOS", Regex::new(r"iP(?:hone|od|ad)").unwrap()),
        ("Android OS", Regex::new(r"Android").unwrap()),
        ("Windows 10", Regex::new(r"Windows NT 10\.0").unwrap()),
        ("Windows 8.1", Regex::new(r"Windows NT 6\.3").unwrap()),
        ("Windows 8", Regex::new(r"Windows NT 6\.2").unwrap()),
        ("Windows 7", Regex::new(r"Windows NT 6\.1").unwrap()),
        ("Chrome OS", Regex::new(r"CrOS").unwrap()),
        ("Mac OS", Regex::new(r"Mac OS X").unwrap()),
        ("Linux", Regex::new(r"Linux|X11").unwrap()),
    ];
}

/// Detect browser name, version and OS from a user-agent string
pub fn detect(user_agent: &str) -> Option<BrowserInfo> {
    let (name, version) = BROWSER_RULES.iter().find_map(|(name, rule)| {
        rule.captures(user_agent)
            .and_then(|c| c.get(1))
            .map(|v| (*name, v.as_str().replace('_', ".")))
    })?;

    let os = OS_RULES
        .iter()
        .find(|(_, rule)| rule.is_match(user_agent))
        .map(|(os, _)| os.to_string());

    Some(BrowserInfo {
        name: name.to_string(),
        version,
        os,
    })
}

/// `metric.Browser.OS` with whitespace stripped from the tags
pub fn tag_metric_name(metric_name: &str, browser: Option<&BrowserInfo>) -> String {
    let mut tagged = metric_name.to_string();
    if let Some(browser) = browser.filter(|b| !b.name.is_empty()) {
        tagged.push('.');
        tagged.extend(browser.name.chars().filter(|c| !c.is_whitespace()));
        if let Some(os) = browser.os.as_deref().filter(|os| !os.is_empty()) {
            tagged.push('.');
            tagged.extend(os.chars().filter(|c| !c.is_whitespace()));
        }
    }
    tagged
}
