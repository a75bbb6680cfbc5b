//! Canonical resource URLs.
//!
//! Every URL has the shape `<domain?>/<namespace>/<resource>/[<id>/][<suffix>/]`
//! and always ends in exactly one `/`. Resource URIs embedded in payloads use
//! the same shape without the domain.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    namespace: String,
    server_domain: Option<String>,
}

impl UrlBuilder {
    /// Fails when the namespace is empty; the check is not repeated per call.
    pub fn new(namespace: &str, server_domain: Option<&str>) -> Result<Self, Error> {
        let namespace = namespace.trim_matches('/');
        if namespace.is_empty() {
            return Err(Error::Configuration(
                "namespace parameter is mandatory".to_string(),
            ));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            server_domain: server_domain
                .map(|domain| domain.trim_end_matches('/').to_string())
                .filter(|domain| !domain.is_empty()),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Absolute URL for a resource path, optionally narrowed to an id and a suffix.
    pub fn build_url(&self, resource_path: &str, id: Option<&str>, suffix: Option<&str>) -> String {
        let path = self.join(resource_path, id, suffix);
        match &self.server_domain {
            Some(domain) => format!("{domain}{path}"),
            None => path,
        }
    }

    /// The URI a payload uses to reference a resource: `/<namespace>/<resource>/<id>/`.
    pub fn resource_uri(&self, resource_path: &str, id: &str) -> String {
        self.join(resource_path, Some(id), None)
    }

    /// The bulk-fetch sub-resource: `.../<resource>/set/<id>;<id>/`.
    pub fn set_url(&self, resource_path: &str, ids: &[String]) -> String {
        format!("{}set/{}/", self.build_url(resource_path, None, None), ids.join(";"))
    }

    fn join(&self, resource_path: &str, id: Option<&str>, suffix: Option<&str>) -> String {
        let mut url = String::from("/");
        let segments = [Some(self.namespace.as_str()), Some(resource_path), id, suffix];
        for segment in segments.into_iter().flatten() {
            let segment = segment.trim_matches('/');
            if segment.is_empty() {
                continue;
            }
            url.push_str(segment);
            url.push('/');
        }
        url
    }
}
