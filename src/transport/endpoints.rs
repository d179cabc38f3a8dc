//! ESIOS endpoint layout
//!
//! Keeps every path template in one place so the resolver only deals with
//! resource names, ids and file keys.

/// Endpoint paths, relative to the API base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Archive listing (`GET`, optional `date` parameter)
    pub archives: &'static str,
    /// Archive download by id or key: `{archives}/{key}/download`
    pub archive_download_suffix: &'static str,
    /// JSON archives, fetched by name: `{archives_json}/{name}`
    pub archives_json: &'static str,
    /// Indicator listing and indicator data: `{indicators}/{id}`
    pub indicators: &'static str,
    /// Query parameter carrying the target date
    pub date_param: &'static str,
}

/// Production endpoint layout
pub const ESIOS_ENDPOINTS: Endpoints = Endpoints {
    archives: "/archives",
    archive_download_suffix: "/download",
    archives_json: "/archives_json",
    indicators: "/indicators",
    date_param: "date",
};

impl Endpoints {
    /// Listing of every archive
    pub fn archive_listing(&self) -> String {
        self.archives.to_string()
    }

    /// Download path for an archive id or name
    pub fn archive_download(&self, key: &str) -> String {
        format!("{}/{}{}", self.archives, key, self.archive_download_suffix)
    }

    /// Listing of every JSON archive
    pub fn archive_json_listing(&self) -> String {
        self.archives_json.to_string()
    }

    /// JSON archive path
    pub fn archive_json(&self, name: &str) -> String {
        format!("{}/{}", self.archives_json, name)
    }

    /// Indicator listing
    pub fn indicator_listing(&self) -> String {
        self.indicators.to_string()
    }

    /// Indicator data path
    pub fn indicator(&self, id: u32) -> String {
        format!("{}/{}", self.indicators, id)
    }

    /// Program report path
    pub fn program(&self, name: &str) -> String {
        self.archive_download(name)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        ESIOS_ENDPOINTS
    }
}

/// Split a listing-provided URL into path and query pairs, dropping scheme and host
pub fn split_location(url: &str) -> (String, Vec<(String, String)>) {
    let without_host = match url.find("://") {
        Some(pos) => {
            let rest = &url[pos + 3..];
            rest.find('/').map(|p| &rest[p..]).unwrap_or("/")
        }
        None => url,
    };
    let (path, query) = match without_host.split_once('?') {
        Some((path, query)) => (path, query),
        None => (without_host, ""),
    };
    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    (path.to_string(), params)
}
