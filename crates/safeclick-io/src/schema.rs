//! Ordered feature column schemas.

/// The 37 URL and page features, in the order the serving model expects.
const URL_FEATURES: [&str; 37] = [
    "NumDots",
    "SubdomainLevel",
    "PathLevel",
    "UrlLength",
    "NumDash",
    "NumDashInHostname",
    "NumUnderscore",
    "NumPercent",
    "NumQueryComponents",
    "NumAmpersand",
    "NumNumericChars",
    "NoHttps",
    "RandomString",
    "IpAddress",
    "DomainInPaths",
    "HostnameLength",
    "PathLength",
    "QueryLength",
    "NumSensitiveWords",
    "EmbeddedBrandName",
    "PctExtHyperlinks",
    "PctExtResourceUrls",
    "ExtFavicon",
    "InsecureForms",
    "RelativeFormAction",
    "ExtFormAction",
    "PctNullSelfRedirectHyperlinks",
    "FrequentDomainNameMismatch",
    "SubmitInfoToEmail",
    "IframeOrFrame",
    "MissingTitle",
    "SubdomainLevelRT",
    "UrlLengthRT",
    "PctExtResourceUrlsRT",
    "AbnormalExtFormActionR",
    "ExtMetaScriptLinkRT",
    "PctExtNullSelfRedirectHyperlinksRT",
];

/// An ordered list of feature column names.
///
/// When attached to a [`DatasetReader`](crate::DatasetReader), the columns
/// of the loaded matrix follow this order regardless of the file's header
/// order, and every named column must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema from column names in the desired order.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// The phishing URL feature set.
    #[must_use]
    pub fn url_features() -> Self {
        Self::new(URL_FEATURES.iter().map(|&name| name.to_string()).collect())
    }

    /// Return the column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Return the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Return `true` if the schema names no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Return the position of `column` in the schema.
    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}
