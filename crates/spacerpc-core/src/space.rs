//! Space identity and URL construction.

use std::str::FromStr;

use crate::error::ClientError;

/// Identity of a Space: an owner and a resource name, as in `owner/resource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceId {
    pub owner: String,
    pub resource: String,
}

impl FromStr for SpaceId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, resource))
                if !owner.is_empty() && !resource.is_empty() && !resource.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    resource: resource.to_string(),
                })
            }
            _ => Err(ClientError::InvalidSpaceId(s.to_string())),
        }
    }
}

impl std::fmt::Display for SpaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.resource)
    }
}

/// Hostname slug for a Space: lowercase `owner-resource` with every run of
/// characters outside `[a-z0-9-]` collapsed to a single `-`.
pub fn slugify(owner: &str, resource: &str) -> String {
    let joined = format!("{}-{}", owner.to_lowercase(), resource.to_lowercase());
    let mut slug = String::with_capacity(joined.len());
    let mut in_invalid_run = false;
    for c in joined.chars() {
        if matches!(c, 'a'..='z' | '0'..='9' | '-') {
            slug.push(c);
            in_invalid_run = false;
        } else if !in_invalid_run {
            slug.push('-');
            in_invalid_run = true;
        }
    }
    slug
}

/// Base URL for a Space, routed to a specific replica when one resolved and
/// left to the load balancer otherwise.
pub fn space_host(domain: &str, owner: &str, resource: &str, replica: Option<&str>) -> String {
    let slug = slugify(owner, resource);
    match replica {
        Some(replica) => format!("https://{slug}.{domain}/--replicas/{replica}"),
        None => format!("https://{slug}.{domain}"),
    }
}

/// URL of the live-metrics event stream for a Space.
pub fn metrics_url(api_base: &str, owner: &str, resource: &str) -> String {
    format!("{api_base}/v1/{owner}/{resource}/live-metrics/sse")
}
