//! The MySQL server resource kind

use crate::types::{
    EnabledState, MySqlServerObservation, MySqlServerParameters, Server, ServerState,
    StorageProfile,
};
use dbflow_cloud::ResourceKind;
use dbflow_cloud::late_init;

/// Managed MySQL server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MySqlServer;

impl ResourceKind for MySqlServer {
    const KIND: &'static str = "MySQLServer";

    type Parameters = MySqlServerParameters;
    type Observation = MySqlServerObservation;
    type Observed = Server;
    type State = ServerState;

    fn late_initialize(params: &MySqlServerParameters, server: &Server) -> MySqlServerParameters {
        let observed = &server.properties;
        let storage = &observed.storage_profile;

        MySqlServerParameters {
            tags: late_init::map(&params.tags, &server.tags),
            version: late_init::value(&params.version, &observed.version),
            ssl_enforcement: late_init::option(&params.ssl_enforcement, &observed.ssl_enforcement),
            storage_profile: StorageProfile {
                backup_retention_days: late_init::option(
                    &params.storage_profile.backup_retention_days,
                    &storage.backup_retention_days,
                ),
                geo_redundant_backup: late_init::option(
                    &params.storage_profile.geo_redundant_backup,
                    &storage.geo_redundant_backup.map(|s| s.is_enabled()),
                ),
                storage_autogrow: late_init::option(
                    &params.storage_profile.storage_autogrow,
                    &storage.storage_autogrow.map(|s| s.is_enabled()),
                ),
                ..params.storage_profile.clone()
            },
            ..params.clone()
        }
    }

    fn is_up_to_date(params: &MySqlServerParameters, server: &Server) -> bool {
        let observed = &server.properties;
        let storage = &observed.storage_profile;
        let desired = &params.storage_profile;

        let sku_matches = match &server.sku {
            Some(sku) => sku.name == params.sku.name(),
            None => {
                tracing::debug!("Server {} reports no SKU", server.name);
                false
            }
        };

        sku_matches
            && params.version == observed.version
            && params.ssl_enforcement == observed.ssl_enforcement
            && desired.storage_mb == storage.storage_mb
            && desired.backup_retention_days == storage.backup_retention_days
            && desired.geo_redundant_backup.map(EnabledState::from) == storage.geo_redundant_backup
            && desired.storage_autogrow.map(EnabledState::from) == storage.storage_autogrow
            && params.tags == server.tags
    }

    fn observation(server: &Server) -> MySqlServerObservation {
        MySqlServerObservation::from(server)
    }

    fn state(observation: &MySqlServerObservation) -> ServerState {
        observation.user_visible_state
    }

    fn endpoint(observation: &MySqlServerObservation) -> String {
        observation.fully_qualified_domain_name.clone()
    }

    fn admin_login(params: &MySqlServerParameters) -> &str {
        &params.administrator_login
    }
}
