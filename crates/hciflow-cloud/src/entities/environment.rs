//! Environments
//!
//! An environment belongs to an organization and a service connection and
//! carries three roles. Environments are not environment-scoped themselves,
//! so they resolve against the [`DirectoryCatalog`].

use crate::api::{Options, TaskRef};
use crate::catalog::DirectoryCatalog;
use crate::error::{CloudError, Result};
use crate::identifier::{Reference, project_reference, resolve_reference};
use crate::membership::{
    ENVIRONMENT_ADMIN_ROLE, MemberSet, READ_ONLY_ROLE, RoleAssignment, RoleMember, USER_ROLE,
    project_members, resolve_members,
};
use crate::plan::{RemoteOperation, UpdateFamily};
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ENTITY_TYPE: &str = "environments";

const DETAILS: UpdateFamily = UpdateFamily {
    name: "details",
    fields: &["name", "description", "admin_role", "user_role", "read_only_role"],
};
const FAMILIES: &[UpdateFamily] = &[DETAILS];
const IMMUTABLE: &[&str] = &["organization_code", "service_code"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Organization entry point or id
    pub organization_code: Reference,
    /// Service connection code or id
    pub service_code: Reference,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "MemberSet::is_empty")]
    pub admin_role: MemberSet,
    #[serde(default, skip_serializing_if = "MemberSet::is_empty")]
    pub user_role: MemberSet,
    #[serde(default, skip_serializing_if = "MemberSet::is_empty")]
    pub read_only_role: MemberSet,
}

impl EnvironmentSpec {
    fn roles(&self) -> [(&'static str, &MemberSet); 3] {
        [
            (ENVIRONMENT_ADMIN_ROLE, &self.admin_role),
            (USER_ROLE, &self.user_role),
            (READ_ONLY_ROLE, &self.read_only_role),
        ]
    }
}

impl Declare for EnvironmentSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("organization_code", &self.organization_code)
            .with("service_code", &self.service_code)
            .with("name", &self.name)
            .with("description", &self.description)
            .with("admin_role", &self.admin_role)
            .with("user_role", &self.user_role)
            .with("read_only_role", &self.read_only_role)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteOrganization {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub entry_point: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteServiceConnection {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_code: String,
}

/// Environment record as exchanged with `environments`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemoteEnvironment {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub organization: RemoteOrganization,
    pub service_connection: RemoteServiceConnection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleAssignment>,
}

impl RemoteEnvironment {
    fn members_of(&self, role: &str) -> Vec<RoleMember> {
        self.roles
            .iter()
            .filter(|r| r.name.eq_ignore_ascii_case(role))
            .flat_map(|r| r.users.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentOperation {
    /// Rewrite name, description and roles in one call
    Update { spec: Box<EnvironmentSpec> },
}

impl RemoteOperation for EnvironmentOperation {
    fn family(&self) -> &'static str {
        DETAILS.name
    }
}

fn not_found_as(e: CloudError, message: impl FnOnce() -> String) -> CloudError {
    if e.is_not_found() {
        CloudError::NotFound(message())
    } else {
        e
    }
}

async fn environment_body(
    directory: &DirectoryCatalog,
    spec: &EnvironmentSpec,
) -> Result<RemoteEnvironment> {
    let organization_id = resolve_reference(&spec.organization_code, || directory.organizations())
        .await
        .map_err(|e| {
            not_found_as(e, || {
                format!("Organization with entry point {} not found", spec.organization_code)
            })
        })?;
    let service_connections = || directory.service_connections();
    let service_connection_id = resolve_reference(&spec.service_code, service_connections)
        .await
        .map_err(|e| {
            not_found_as(e, || {
                format!("Service connection with service code {} not found", spec.service_code)
            })
        })?;

    // the user listing is only needed when some member is given by name
    let by_name = spec
        .roles()
        .iter()
        .any(|(_, members)| members.iter().any(|m| !m.is_id()));
    let users = if by_name {
        Some(directory.users_by_organization(&organization_id).await?)
    } else {
        None
    };

    let mut roles = Vec::new();
    for (role, members) in spec.roles() {
        if members.is_empty() {
            continue;
        }
        let assignment = match &users {
            Some(users) => resolve_members(role, members, users)?,
            None => RoleAssignment {
                name: role.to_string(),
                users: members
                    .iter()
                    .map(|m| RoleMember {
                        id: m.as_str().to_string(),
                        ..Default::default()
                    })
                    .collect(),
            },
        };
        roles.push(assignment);
    }

    Ok(RemoteEnvironment {
        id: String::new(),
        name: spec.name.clone(),
        description: spec.description.clone(),
        organization: RemoteOrganization {
            id: organization_id,
            ..Default::default()
        },
        service_connection: RemoteServiceConnection {
            id: service_connection_id,
            ..Default::default()
        },
        roles,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentReconciler;

#[async_trait]
impl Reconciler for EnvironmentReconciler {
    type Spec = EnvironmentSpec;
    type Operation = EnvironmentOperation;
    type Scope = DirectoryCatalog;

    fn entity(&self) -> &'static str {
        "Environment"
    }

    fn families(&self) -> &'static [UpdateFamily] {
        FAMILIES
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(
        &self,
        old: &EnvironmentSpec,
        new: &EnvironmentSpec,
    ) -> Result<Vec<EnvironmentOperation>> {
        if DETAILS.changed(&old.declared(), &new.declared()) {
            Ok(vec![EnvironmentOperation::Update {
                spec: Box::new(new.clone()),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn create(
        &self,
        directory: &DirectoryCatalog,
        spec: &EnvironmentSpec,
    ) -> Result<Created> {
        let body = environment_body(directory, spec).await?;
        let response = directory
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, Options::new())
            .await
            .map_err(|e| e.during(format!("creating environment {}", spec.name)))?;
        let created: RemoteEnvironment = response.decode()?;
        Ok(Created::new(created.id).with_task(response.task()))
    }

    async fn fetch(
        &self,
        directory: &DirectoryCatalog,
        id: &str,
        declared: &EnvironmentSpec,
    ) -> Result<Option<ObservedState<EnvironmentSpec>>> {
        let environment: RemoteEnvironment = directory.service(ENTITY_TYPE).get_as(id).await?;
        debug!(
            environment = %environment.name,
            roles = environment.roles.len(),
            "fetched environment"
        );

        let organization = &environment.organization;
        let connection = &environment.service_connection;
        let organization_code = project_reference(
            &declared.organization_code,
            &organization.id,
            &organization.entry_point,
            || directory.organizations(),
        )
        .await?;
        let service_code = project_reference(
            &declared.service_code,
            &connection.id,
            &connection.service_code,
            || directory.service_connections(),
        )
        .await?;
        let spec = EnvironmentSpec {
            organization_code,
            service_code,
            name: environment.name.clone(),
            description: environment.description.clone(),
            admin_role: project_members(
                &environment.members_of(ENVIRONMENT_ADMIN_ROLE),
                &declared.admin_role,
            ),
            user_role: project_members(&environment.members_of(USER_ROLE), &declared.user_role),
            read_only_role: project_members(
                &environment.members_of(READ_ONLY_ROLE),
                &declared.read_only_role,
            ),
        };
        Ok(Some(
            ObservedState::new(id, spec)
                .with_text("organization_id", &organization.id)
                .with_text("service_connection_id", &connection.id),
        ))
    }

    async fn execute(
        &self,
        directory: &DirectoryCatalog,
        id: &str,
        _new: &EnvironmentSpec,
        operation: &EnvironmentOperation,
    ) -> Result<Option<TaskRef>> {
        let EnvironmentOperation::Update { spec } = operation;
        let mut body = environment_body(directory, spec).await?;
        body.id = id.to_string();
        let response = directory
            .service(ENTITY_TYPE)
            .update(id, serde_json::to_value(&body)?)
            .await?;
        Ok(response.task())
    }

    async fn remove(
        &self,
        directory: &DirectoryCatalog,
        id: &str,
        declared: &EnvironmentSpec,
    ) -> Result<Option<TaskRef>> {
        info!(environment = %declared.name, id, "destroying environment");
        Ok(directory.service(ENTITY_TYPE).delete(id).await?.task())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, Method};
    use crate::reconciler;
    use crate::testing::FakeApi;
    use serde_json::json;

    const ENV_ID: &str = "0b6c1f5e-2d3a-4e7b-8c9d-1a2b3c4d5e6f";
    const ORG_ID: &str = "7d8e9f0a-1b2c-4d3e-8f4a-5b6c7d8e9f0a";
    const CONNECTION_ID: &str = "3c4d5e6f-7a8b-4c9d-8e0f-1a2b3c4d5e6f";
    const ALICE: &str = "33333333-3333-3333-3333-333333333333";
    const BOB: &str = "22222222-2222-2222-2222-222222222222";

    fn spec() -> EnvironmentSpec {
        EnvironmentSpec {
            organization_code: Reference::parse("acme"),
            service_code: Reference::parse("compute-on"),
            name: "dev".into(),
            description: "development".into(),
            admin_role: ["alice", BOB].into_iter().collect(),
            ..Default::default()
        }
    }

    fn directory_routes(api: &FakeApi) {
        api.on(
            Method::Get,
            "organizations",
            ApiResponse::ok(json!([{"id": ORG_ID, "entryPoint": "acme"}])),
        );
        api.on(
            Method::Get,
            "service_connections",
            ApiResponse::ok(json!([{"id": CONNECTION_ID, "serviceCode": "compute-on"}])),
        );
        api.on(
            Method::Get,
            "users",
            ApiResponse::ok(json!([
                {"id": BOB, "userName": "bob"},
                {"id": ALICE, "userName": "alice"}
            ])),
        );
    }

    fn remote(admins: serde_json::Value) -> ApiResponse {
        ApiResponse::ok(json!({
            "id": ENV_ID,
            "name": "dev",
            "description": "development",
            "organization": {"id": ORG_ID, "entryPoint": "acme"},
            "serviceConnection": {"id": CONNECTION_ID, "serviceCode": "compute-on"},
            "roles": [
                {"name": "Environment admin", "users": admins},
                {"name": "User", "users": []}
            ]
        }))
    }

    #[tokio::test]
    async fn test_create_resolves_roles_and_reads_back() {
        let api = FakeApi::new();
        directory_routes(&api);
        api.on(Method::Post, "environments", ApiResponse::ok(json!({"id": ENV_ID})));
        api.on(
            Method::Get,
            &format!("environments/{ENV_ID}"),
            remote(json!([
                {"id": ALICE, "userName": "alice"},
                {"id": BOB, "userName": "bob"}
            ])),
        );
        let directory = DirectoryCatalog::new(api.clone());

        let result = reconciler::create(&EnvironmentReconciler, &directory, &spec()).await;
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.remote_id.as_deref(), Some(ENV_ID));
        assert_eq!(result.observed.unwrap().spec, spec());

        let create = api
            .requests()
            .into_iter()
            .find(|r| r.method == Method::Post)
            .unwrap();
        let body = create.body.unwrap();
        assert_eq!(body["organization"]["id"], ORG_ID);
        assert_eq!(body["serviceConnection"]["id"], CONNECTION_ID);
        assert_eq!(body["roles"][0]["name"], "Environment admin");
        let mut ids: Vec<_> = body["roles"][0]["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![BOB.to_string(), ALICE.to_string()]);

        let users = api
            .requests()
            .into_iter()
            .find(|r| r.endpoint == "users")
            .unwrap();
        assert_eq!(users.options.get("organizationId").map(String::as_str), Some(ORG_ID));
    }

    #[tokio::test]
    async fn test_unknown_organization() {
        let api = FakeApi::new();
        directory_routes(&api);
        let directory = DirectoryCatalog::new(api.clone());
        let declared = EnvironmentSpec {
            organization_code: Reference::parse("globex"),
            ..spec()
        };

        let result = reconciler::create(&EnvironmentReconciler, &directory, &declared).await;
        let err = result.error.unwrap();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Organization with entry point globex not found");
        assert_eq!(api.mutations(), 0);
    }

    #[tokio::test]
    async fn test_id_members_skip_user_listing() {
        let api = FakeApi::new();
        directory_routes(&api);
        let directory = DirectoryCatalog::new(api.clone());
        let declared = EnvironmentSpec {
            organization_code: Reference::parse(ORG_ID),
            service_code: Reference::parse(CONNECTION_ID),
            admin_role: [BOB].into_iter().collect(),
            ..spec()
        };

        let body = environment_body(&directory, &declared).await.unwrap();
        assert_eq!(body.roles[0].users[0].id, BOB);
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_read_reports_new_members_by_name() {
        let api = FakeApi::new();
        api.on(
            Method::Get,
            &format!("environments/{ENV_ID}"),
            remote(json!([
                {"id": BOB, "userName": "bob"},
                {"id": "44444444-4444-4444-4444-444444444444", "userName": "carol"}
            ])),
        );
        let directory = DirectoryCatalog::new(api.clone());
        let declared = EnvironmentSpec {
            admin_role: [BOB].into_iter().collect(),
            ..spec()
        };

        let observed = reconciler::read(
            &EnvironmentReconciler,
            &directory,
            ENV_ID,
            &declared,
            reconciler::ReadMode::Tolerant,
        )
        .await
        .unwrap()
        .unwrap();
        let admins: Vec<_> = observed.spec.admin_role.iter().map(Reference::as_str).collect();
        assert_eq!(admins, vec![BOB, "carol"]);
        assert!(observed.spec.user_role.is_empty());
    }

    #[test]
    fn test_role_change_is_one_update() {
        let new = EnvironmentSpec {
            read_only_role: ["carol"].into_iter().collect(),
            description: "dev env".into(),
            ..spec()
        };
        let plan = EnvironmentReconciler.plan(&spec(), &new).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].family(), "details");
        assert!(EnvironmentReconciler.plan(&spec(), &spec()).unwrap().is_empty());
    }
}
