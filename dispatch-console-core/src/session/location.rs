//! Console location and navigation
//!
//! A location is a path plus query parameters. The navigator owns the
//! current location of a console session and implements the two handoffs of
//! the connect flow: into the console once the session is ready, and back to
//! the connect screen when it drops.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use url::form_urlencoded;

/// Query parameter that remembers where to go after connecting
pub const ORG_PARAM: &str = "org";

/// Screen shown after connecting when nothing else was requested
pub const DEFAULT_DESTINATION: &str = "overview";

/// Name of the connect screen
pub const CONNECT_SCREEN: &str = "connect";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: BTreeMap<String, String>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    /// Parse `"/path?key=value&..."`
    pub fn parse(location: &str) -> Self {
        let (path, query) = match location.split_once('?') {
            Some((path, query)) => (path, query),
            None => (location, ""),
        };
        Self {
            path: path.to_string(),
            query: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn search(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Set a query parameter, or remove it with `None`
    pub fn set_search(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.query.insert(key.to_string(), value.to_string());
            }
            None => {
                self.query.remove(key);
            }
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

/// Current location of a console session
///
/// Cheap to clone; clones share the location. Changes can be observed with
/// [`Navigator::subscribe`].
#[derive(Clone)]
pub struct Navigator {
    plugin_root: String,
    location: Arc<watch::Sender<Location>>,
}

impl Navigator {
    pub fn new(plugin_root: impl Into<String>, initial: Location) -> Self {
        let (location, _) = watch::channel(initial);
        Self {
            plugin_root: plugin_root.into(),
            location: Arc::new(location),
        }
    }

    pub fn plugin_root(&self) -> &str {
        &self.plugin_root
    }

    pub fn connect_path(&self) -> String {
        format!("{}/{}", self.plugin_root, CONNECT_SCREEN)
    }

    pub fn current(&self) -> Location {
        self.location.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.location.subscribe()
    }

    /// Replace the current location
    pub fn navigate(&self, location: Location) {
        self.location.send_replace(location);
    }

    /// Leave the connect screen once the session is ready
    ///
    /// Only acts while inside the plugin root. The destination is the
    /// stashed `org` parameter unless it is missing or names the connect
    /// screen, in which case it is the overview. The stash is cleared.
    pub fn handoff_after_ready(&self) -> Location {
        let root = self.plugin_root.clone();
        self.location.send_if_modified(|location| {
            if !location.path().starts_with(&root) {
                return false;
            }
            let destination = match location.search(ORG_PARAM) {
                Some(org) if !org.is_empty() && org != CONNECT_SCREEN => org.to_string(),
                _ => DEFAULT_DESTINATION.to_string(),
            };
            location.set_search(ORG_PARAM, None);
            location.set_path(format!("{}/{}", root, destination));
            true
        });

        let location = self.current();
        info!(%location, "Session ready");
        location
    }

    /// Go back to the connect screen after the session dropped
    ///
    /// The screen being left is stashed in `org` so the next successful
    /// connect returns to it; leaving the connect screen itself clears it.
    pub fn redirect_to_connect(&self) -> Location {
        let connect_path = self.connect_path();
        let root = self.plugin_root.clone();
        self.location.send_modify(|location| {
            let previous = location.path().to_string();
            let relative = previous
                .strip_prefix(root.as_str())
                .unwrap_or(previous.as_str())
                .trim_start_matches('/')
                .to_string();

            location.set_path(connect_path);
            if !relative.is_empty() && relative != CONNECT_SCREEN {
                location.set_search(ORG_PARAM, Some(relative.as_str()));
            } else {
                location.set_search(ORG_PARAM, None);
            }
        });

        let location = self.current();
        info!(%location, "Returned to connect screen");
        location
    }
}
