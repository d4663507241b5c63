//! Key path helpers.
//!
//! Keys are slash-separated absolute paths. Every path handed to a
//! [`ConfigStore`](crate::ConfigStore) is relative to the store's namespace,
//! and the entity layout is:
//!
//! - `/applications/{id}`
//! - `/services/{id}`
//! - `/deployments/{serviceId}/{id}`

use admiral_core::{ApplicationId, DeploymentId, ServiceId};

/// Directory holding application records.
pub const APPLICATIONS: &str = "/applications";

/// Directory holding service records.
pub const SERVICES: &str = "/services";

/// Directory holding one subdirectory of deployment records per service.
pub const DEPLOYMENTS: &str = "/deployments";

/// Path of an application record.
#[must_use]
pub fn application_path(id: &ApplicationId) -> String {
    format!("{APPLICATIONS}/{id}")
}

/// Path of a service record.
#[must_use]
pub fn service_path(id: &ServiceId) -> String {
    format!("{SERVICES}/{id}")
}

/// Directory holding every deployment of one service.
#[must_use]
pub fn service_deployments_path(service: &ServiceId) -> String {
    format!("{DEPLOYMENTS}/{service}")
}

/// Path of a deployment record.
#[must_use]
pub fn deployment_path(service: &ServiceId, id: &DeploymentId) -> String {
    format!("{DEPLOYMENTS}/{service}/{id}")
}

/// Normalize a path: leading slash, no trailing slash, no empty segments.
#[must_use]
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Prefix a path with a namespace.
#[must_use]
pub fn join(namespace: &str, path: &str) -> String {
    normalize(&format!("{namespace}/{path}"))
}

/// Remove a namespace prefix from an absolute key.
///
/// Keys outside the namespace are returned normalized but otherwise unchanged.
#[must_use]
pub fn strip_namespace(namespace: &str, key: &str) -> String {
    let namespace = normalize(namespace);
    let key = normalize(key);
    if namespace == "/" {
        return key;
    }
    match key.strip_prefix(&namespace) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => key,
    }
}

/// The final segment of a path.
#[must_use]
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// All proper ancestors of a normalized path, outermost first, excluding `/`.
#[must_use]
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

/// The prefix shared by every descendant of a directory key.
#[must_use]
pub fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{dir}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_paths() {
        let service: ServiceId = "6f1d4a8e-7d1b-4c55-8b5e-0f9a1c2b3d4e".parse().unwrap();
        let deployment: DeploymentId = "1a2b3c4d-5e6f-4a1b-8c2d-3e4f5a6b7c8d".parse().unwrap();

        assert_eq!(
            service_path(&service),
            "/services/6f1d4a8e-7d1b-4c55-8b5e-0f9a1c2b3d4e"
        );
        assert_eq!(
            deployment_path(&service, &deployment),
            "/deployments/6f1d4a8e-7d1b-4c55-8b5e-0f9a1c2b3d4e/1a2b3c4d-5e6f-4a1b-8c2d-3e4f5a6b7c8d"
        );
        assert!(deployment_path(&service, &deployment)
            .starts_with(&child_prefix(&service_deployments_path(&service))));
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("services/"), "/services");
        assert_eq!(normalize("//a//b/"), "/a/b");
    }

    #[test]
    fn join_and_strip_namespace() {
        assert_eq!(join("/admiral", "/services"), "/admiral/services");
        assert_eq!(join("/", "/vulcand/backends"), "/vulcand/backends");
        assert_eq!(join("/admiral", "/"), "/admiral");

        assert_eq!(strip_namespace("/admiral", "/admiral/services/x"), "/services/x");
        assert_eq!(strip_namespace("/admiral", "/admiral"), "/");
        assert_eq!(strip_namespace("/admiral", "/admiralty/x"), "/admiralty/x");
        assert_eq!(strip_namespace("/", "/vulcand"), "/vulcand");
    }

    #[test]
    fn ancestors_exclude_self_and_root() {
        assert_eq!(ancestors("/a/b/c"), vec!["/a".to_string(), "/a/b".to_string()]);
        assert!(ancestors("/a").is_empty());
        assert!(ancestors("/").is_empty());
    }

    #[test]
    fn last_segment_of_path() {
        assert_eq!(last_segment("/deployments/s/d"), "d");
        assert_eq!(last_segment("/"), "");
    }
}
