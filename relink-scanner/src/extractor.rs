use crate::error::{Result, ScanError};
use crate::record::LinkRecord;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// How to pair the link and label selector outputs when their lengths differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingPolicy {
    /// Refuse to pair sequences of unequal length.
    #[default]
    Strict,
    /// Pair up to the shorter sequence and drop the rest.
    Truncate,
}

impl PairingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairingPolicy::Strict => "strict",
            PairingPolicy::Truncate => "truncate",
        }
    }
}

/// Pulls (label, url) pairs out of a category listing page.
///
/// Links and labels come from two independent selectors and are zipped by
/// position, so both must walk the page in the same document order.
pub struct Extractor {
    link_selector: Selector,
    link_attr: String,
    label_selector: Selector,
    pairing: PairingPolicy,
}

impl Extractor {
    pub fn new(
        link_selector: &str,
        link_attr: &str,
        label_selector: &str,
        pairing: PairingPolicy,
    ) -> Result<Self> {
        Ok(Self {
            link_selector: parse_selector(link_selector)?,
            link_attr: link_attr.to_string(),
            label_selector: parse_selector(label_selector)?,
            pairing,
        })
    }

    pub fn extract(&self, html: &str, base_url: &Url) -> Result<Vec<LinkRecord>> {
        let document = Html::parse_document(html);

        // Elements without the attribute yield nothing, like an attribute XPath would.
        let links = document
            .select(&self.link_selector)
            .filter_map(|element| element.value().attr(&self.link_attr))
            .map(|href| resolve_url(base_url, href.trim()))
            .collect::<Result<Vec<String>>>()?;

        let labels: Vec<String> = document
            .select(&self.label_selector)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .collect();

        debug!(
            "Selected {} links and {} labels from {}",
            links.len(),
            labels.len(),
            base_url
        );

        if links.len() != labels.len() {
            match self.pairing {
                PairingPolicy::Strict => {
                    return Err(ScanError::ShapeMismatch {
                        links: links.len(),
                        labels: labels.len(),
                    });
                }
                PairingPolicy::Truncate => {
                    warn!(
                        "Selector outputs differ ({} links, {} labels), dropping {} unpaired items",
                        links.len(),
                        labels.len(),
                        links.len().abs_diff(labels.len())
                    );
                }
            }
        }

        if links.is_empty() || labels.is_empty() {
            warn!("No category links found on {}", base_url);
        }

        Ok(labels
            .into_iter()
            .zip(links)
            .map(|(label, url)| LinkRecord { label, url })
            .collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScanError::Selector {
        selector: selector.to_string(),
        message: format!("{e:?}"),
    })
}

fn resolve_url(base: &Url, href: &str) -> Result<String> {
    base.join(href)
        .map(|resolved| resolved.to_string())
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", href, e)))
}
