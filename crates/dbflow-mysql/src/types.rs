//! MySQL server parameters and provider payloads

use crate::sku::Sku;
use dbflow_cloud::UserVisibleState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Provider on/off flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnabledState {
    Enabled,
    Disabled,
}

impl EnabledState {
    pub fn is_enabled(&self) -> bool {
        *self == EnabledState::Enabled
    }
}

impl From<bool> for EnabledState {
    fn from(enabled: bool) -> Self {
        if enabled {
            EnabledState::Enabled
        } else {
            EnabledState::Disabled
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProfile {
    /// Max storage in megabytes
    pub storage_mb: u32,

    /// Backup retention in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_retention_days: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_redundant_backup: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_autogrow: Option<bool>,
}

/// Desired state of a MySQL server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MySqlServerParameters {
    pub resource_group_name: String,

    pub location: String,

    pub administrator_login: String,

    pub sku: Sku,

    /// Server version, e.g. `5.7`
    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_enforcement: Option<EnabledState>,

    pub storage_profile: StorageProfile,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Lifecycle state reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerState {
    Ready,
    Dropping,
    Disabled,
    Inaccessible,
    #[default]
    #[serde(other)]
    Unknown,
}

impl UserVisibleState for ServerState {
    fn is_ready(&self) -> bool {
        *self == ServerState::Ready
    }

    fn is_dropping(&self) -> bool {
        *self == ServerState::Dropping
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Ready => write!(f, "Ready"),
            ServerState::Dropping => write!(f, "Dropping"),
            ServerState::Disabled => write!(f, "Disabled"),
            ServerState::Inaccessible => write!(f, "Inaccessible"),
            ServerState::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for ServerState {
    type Err = std::convert::Infallible;

    /// Unrecognized states map to `Unknown`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Ready" => ServerState::Ready,
            "Dropping" => ServerState::Dropping,
            "Disabled" => ServerState::Disabled,
            "Inaccessible" => ServerState::Inaccessible,
            other => {
                tracing::debug!("Unrecognized server state {:?}, treating as Unknown", other);
                ServerState::Unknown
            }
        })
    }
}

/// SKU as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSku {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

/// Storage settings as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStorageProfile {
    #[serde(default, rename = "storageMB")]
    pub storage_mb: u32,

    #[serde(default)]
    pub backup_retention_days: Option<u32>,

    #[serde(default)]
    pub geo_redundant_backup: Option<EnabledState>,

    #[serde(default)]
    pub storage_autogrow: Option<EnabledState>,
}

impl From<&StorageProfile> for ServerStorageProfile {
    fn from(profile: &StorageProfile) -> Self {
        Self {
            storage_mb: profile.storage_mb,
            backup_retention_days: profile.backup_retention_days,
            geo_redundant_backup: profile.geo_redundant_backup.map(EnabledState::from),
            storage_autogrow: profile.storage_autogrow.map(EnabledState::from),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProperties {
    #[serde(default)]
    pub administrator_login: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub ssl_enforcement: Option<EnabledState>,

    #[serde(default)]
    pub user_visible_state: ServerState,

    #[serde(default)]
    pub fully_qualified_domain_name: String,

    #[serde(default)]
    pub master_server_id: String,

    #[serde(default)]
    pub storage_profile: ServerStorageProfile,
}

/// Provider response for a server GET
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type")]
    pub server_type: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub sku: Option<ServerSku>,

    #[serde(default)]
    pub properties: ServerProperties,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Server {
    /// Parse a provider JSON response
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Observed state persisted in status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlServerObservation {
    pub id: String,
    pub name: String,
    pub server_type: String,
    pub user_visible_state: ServerState,
    pub fully_qualified_domain_name: String,
    pub master_server_id: String,
}

impl From<&Server> for MySqlServerObservation {
    fn from(server: &Server) -> Self {
        Self {
            id: server.id.clone(),
            name: server.name.clone(),
            server_type: server.server_type.clone(),
            user_visible_state: server.properties.user_visible_state,
            fully_qualified_domain_name: server.properties.fully_qualified_domain_name.clone(),
            master_server_id: server.properties.master_server_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCreateProperties {
    pub create_mode: &'static str,
    pub administrator_login: String,
    pub administrator_login_password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_enforcement: Option<EnabledState>,
    pub storage_profile: ServerStorageProfile,
}

/// Request body for creating a server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerForCreate {
    pub location: String,
    pub sku: ServerSku,
    pub properties: ServerCreateProperties,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerUpdateProperties {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_enforcement: Option<EnabledState>,
    pub storage_profile: ServerStorageProfile,
}

/// Request body for updating a server
///
/// Identity fields are absent; the provider does not allow changing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerUpdate {
    pub sku: ServerSku,
    pub properties: ServerUpdateProperties,
    pub tags: BTreeMap<String, String>,
}

fn server_sku(sku: &Sku) -> ServerSku {
    ServerSku {
        name: sku.name(),
        tier: Some(sku.tier.to_string()),
        capacity: Some(sku.capacity),
        family: Some(sku.family.clone()),
    }
}

impl ServerForCreate {
    pub fn new(params: &MySqlServerParameters, admin_password: &str) -> Self {
        Self {
            location: params.location.clone(),
            sku: server_sku(&params.sku),
            properties: ServerCreateProperties {
                create_mode: "Default",
                administrator_login: params.administrator_login.clone(),
                administrator_login_password: admin_password.to_string(),
                version: params.version.clone(),
                ssl_enforcement: params.ssl_enforcement,
                storage_profile: ServerStorageProfile::from(&params.storage_profile),
            },
            tags: params.tags.clone(),
        }
    }
}

impl From<&MySqlServerParameters> for ServerUpdate {
    fn from(params: &MySqlServerParameters) -> Self {
        Self {
            sku: server_sku(&params.sku),
            properties: ServerUpdateProperties {
                version: params.version.clone(),
                ssl_enforcement: params.ssl_enforcement,
                storage_profile: ServerStorageProfile::from(&params.storage_profile),
            },
            tags: params.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sku::SkuTier;

    const SERVER_JSON: &str = r#"{
        "id": "/subscriptions/0000/resourceGroups/orders/providers/Microsoft.DBforMySQL/servers/orders-db",
        "name": "orders-db",
        "type": "Microsoft.DBforMySQL/servers",
        "location": "westeurope",
        "sku": {"name": "GP_Gen5_2", "tier": "GeneralPurpose", "capacity": 2, "family": "Gen5"},
        "properties": {
            "administratorLogin": "dbadmin",
            "version": "5.7",
            "sslEnforcement": "Enabled",
            "userVisibleState": "Ready",
            "fullyQualifiedDomainName": "orders-db.mysql.database.azure.com",
            "masterServerId": "",
            "storageProfile": {
                "storageMB": 51200,
                "backupRetentionDays": 7,
                "geoRedundantBackup": "Disabled",
                "storageAutogrow": "Enabled"
            }
        },
        "tags": {"team": "orders"}
    }"#;

    #[test]
    fn test_parse_server_response() {
        let server = Server::from_json(SERVER_JSON).unwrap();

        assert_eq!(server.name, "orders-db");
        assert_eq!(server.server_type, "Microsoft.DBforMySQL/servers");
        assert_eq!(server.sku.as_ref().unwrap().name, "GP_Gen5_2");
        assert_eq!(server.properties.user_visible_state, ServerState::Ready);
        assert_eq!(server.properties.storage_profile.storage_mb, 51200);
        assert_eq!(
            server.properties.storage_profile.storage_autogrow,
            Some(EnabledState::Enabled)
        );
        assert_eq!(server.tags.get("team").map(String::as_str), Some("orders"));
    }

    #[test]
    fn test_unrecognized_state_is_unknown() {
        let server =
            Server::from_json(r#"{"properties": {"userVisibleState": "Updating"}}"#).unwrap();
        assert_eq!(server.properties.user_visible_state, ServerState::Unknown);
        assert_eq!("Upgrading".parse::<ServerState>().unwrap(), ServerState::Unknown);
        assert_eq!("Dropping".parse::<ServerState>().unwrap(), ServerState::Dropping);
    }

    #[test]
    fn test_observation_from_server() {
        let server = Server::from_json(SERVER_JSON).unwrap();
        let observation = MySqlServerObservation::from(&server);

        assert_eq!(observation.user_visible_state, ServerState::Ready);
        assert_eq!(
            observation.fully_qualified_domain_name,
            "orders-db.mysql.database.azure.com"
        );
        assert!(observation.id.ends_with("/servers/orders-db"));
    }

    #[test]
    fn test_create_request_carries_password() {
        let params = MySqlServerParameters {
            resource_group_name: "orders".to_string(),
            location: "westeurope".to_string(),
            administrator_login: "dbadmin".to_string(),
            sku: Sku::new(SkuTier::GeneralPurpose, "Gen5", 2),
            storage_profile: StorageProfile {
                storage_mb: 51200,
                geo_redundant_backup: Some(false),
                ..StorageProfile::default()
            },
            ..MySqlServerParameters::default()
        };

        let body = serde_json::to_value(ServerForCreate::new(&params, "s3cret")).unwrap();

        assert_eq!(body["sku"]["name"], "GP_Gen5_2");
        assert_eq!(body["properties"]["createMode"], "Default");
        assert_eq!(body["properties"]["administratorLoginPassword"], "s3cret");
        assert_eq!(body["properties"]["storageProfile"]["storageMB"], 51200);
        assert_eq!(
            body["properties"]["storageProfile"]["geoRedundantBackup"],
            "Disabled"
        );
        assert!(body["properties"].get("version").is_none());
    }

    #[test]
    fn test_update_request_omits_identity() {
        let params = MySqlServerParameters {
            resource_group_name: "orders".to_string(),
            location: "westeurope".to_string(),
            administrator_login: "dbadmin".to_string(),
            version: "8.0".to_string(),
            ..MySqlServerParameters::default()
        };

        let body = serde_json::to_value(ServerUpdate::from(&params)).unwrap();

        assert!(body.get("location").is_none());
        assert!(body["properties"].get("administratorLogin").is_none());
        assert_eq!(body["properties"]["version"], "8.0");
    }
}
