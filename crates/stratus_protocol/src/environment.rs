//! Azure cloud environments and the API versions used against each.

/// API versions the broker sends per service family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersions {
    /// Azure AD token endpoint
    pub token: &'static str,
    /// Resource groups (Microsoft.Resources)
    pub resources: &'static str,
    /// Microsoft.ApiManagement
    pub api_management: &'static str,
}

/// A sovereign Azure cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AzureEnvironment {
    pub name: &'static str,
    pub resource_manager_endpoint: &'static str,
    pub active_directory_endpoint: &'static str,
    pub api_versions: ApiVersions,
}

const PUBLIC_CLOUD_VERSIONS: ApiVersions = ApiVersions {
    token: "1.0",
    resources: "2016-09-01",
    api_management: "2016-10-10",
};

const NATIONAL_CLOUD_VERSIONS: ApiVersions = ApiVersions {
    token: "1.0",
    resources: "2016-09-01",
    api_management: "2016-07-07",
};

pub const ENVIRONMENTS: [AzureEnvironment; 4] = [
    AzureEnvironment {
        name: "AzureCloud",
        resource_manager_endpoint: "https://management.azure.com/",
        active_directory_endpoint: "https://login.microsoftonline.com/",
        api_versions: PUBLIC_CLOUD_VERSIONS,
    },
    AzureEnvironment {
        name: "AzureChinaCloud",
        resource_manager_endpoint: "https://management.chinacloudapi.cn/",
        active_directory_endpoint: "https://login.chinacloudapi.cn/",
        api_versions: NATIONAL_CLOUD_VERSIONS,
    },
    AzureEnvironment {
        name: "AzureUSGovernment",
        resource_manager_endpoint: "https://management.usgovcloudapi.net/",
        active_directory_endpoint: "https://login.microsoftonline.us/",
        api_versions: NATIONAL_CLOUD_VERSIONS,
    },
    AzureEnvironment {
        name: "AzureGermanCloud",
        resource_manager_endpoint: "https://management.microsoftazure.de/",
        active_directory_endpoint: "https://login.microsoftonline.de/",
        api_versions: NATIONAL_CLOUD_VERSIONS,
    },
];

impl AzureEnvironment {
    /// Look up an environment by name. An empty name means the public cloud.
    pub fn lookup(name: &str) -> Option<&'static AzureEnvironment> {
        if name.trim().is_empty() {
            return ENVIRONMENTS.first();
        }
        ENVIRONMENTS
            .iter()
            .find(|env| env.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Resource manager endpoint without the trailing slash, ready for path
    /// concatenation.
    pub fn management_base(&self) -> &'static str {
        self.resource_manager_endpoint.trim_end_matches('/')
    }
}
