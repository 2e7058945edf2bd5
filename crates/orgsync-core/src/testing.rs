//! In-memory organization used by the unit tests.

use crate::api::{
    Account, ActionEvaluation, CallerIdentity, CreateAccountState, CreateAccountStatus,
    EvalDecision, FeatureSet, OrgApi, OrganizationInfo, OrganizationalUnit, PolicySummary,
    PolicyTypeSummary, Root, Tag, POLICY_TYPE_ENABLED, SERVICE_CONTROL_POLICY,
};
use crate::error::{ApiError, ApiResult};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

pub const ROOT_ID: &str = "r-root";
pub const MANAGEMENT_ACCOUNT: &str = "111111111111";
pub const CALLER_ARN: &str = "arn:aws:iam::111111111111:user/orgsync";

#[derive(Debug, Clone)]
pub enum Scripted {
    InProgress,
    Succeeded,
    Failed(&'static str),
}

struct FakeAccount {
    parent: String,
    account: Account,
    tags: Vec<Tag>,
}

struct PendingRequest {
    email: String,
    name: String,
    tags: Vec<Tag>,
    script: VecDeque<Scripted>,
    last: CreateAccountStatus,
}

#[derive(Default)]
struct State {
    organization: Option<OrganizationInfo>,
    caller: Option<CallerIdentity>,
    ous: Vec<(String, OrganizationalUnit)>,
    accounts: Vec<FakeAccount>,
    policies: Vec<PolicySummary>,
    attachments: Vec<(String, String)>,
    denied: HashMap<String, EvalDecision>,
    requests: HashMap<String, PendingRequest>,
    scripts: VecDeque<Vec<Scripted>>,
    failures: HashMap<String, ApiError>,
    calls: Vec<String>,
    next_id: u32,
}

pub struct FakeOrg {
    state: RefCell<State>,
}

impl FakeOrg {
    /// An organization whose caller is the management account with SCPs enabled.
    pub fn new() -> Self {
        let state = State {
            organization: Some(OrganizationInfo {
                id: "o-fake".to_string(),
                arn: None,
                feature_set: Some("ALL".to_string()),
                management_account_id: MANAGEMENT_ACCOUNT.to_string(),
                management_account_email: Some("admin@giphouse.nl".to_string()),
                available_policy_types: vec![PolicyTypeSummary {
                    policy_type: SERVICE_CONTROL_POLICY.to_string(),
                    status: POLICY_TYPE_ENABLED.to_string(),
                }],
            }),
            caller: Some(CallerIdentity {
                account: MANAGEMENT_ACCOUNT.to_string(),
                arn: CALLER_ARN.to_string(),
            }),
            ..State::default()
        };
        Self {
            state: RefCell::new(state),
        }
    }

    /// A caller account that is not a member of any organization.
    pub fn without_organization() -> Self {
        let fake = Self::new();
        fake.state.borrow_mut().organization = None;
        fake
    }

    // -- setup ---------------------------------------------------------------

    pub fn add_ou(&self, parent_id: &str, name: &str) -> String {
        let mut s = self.state.borrow_mut();
        let id = next_id(&mut s, "ou");
        s.ous.push((
            parent_id.to_string(),
            OrganizationalUnit {
                id: id.clone(),
                name: name.to_string(),
            },
        ));
        id
    }

    pub fn add_account(&self, parent_id: &str, email: &str, tags: &[(&str, &str)]) -> String {
        let mut s = self.state.borrow_mut();
        let id = next_id(&mut s, "acct");
        s.accounts.push(FakeAccount {
            parent: parent_id.to_string(),
            account: Account {
                id: id.clone(),
                email: email.to_string(),
                name: None,
            },
            tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
        });
        id
    }

    pub fn add_policy(&self, name: &str) -> String {
        let mut s = self.state.borrow_mut();
        let id = next_id(&mut s, "p");
        s.policies.push(PolicySummary {
            id: id.clone(),
            name: name.to_string(),
            aws_managed: false,
        });
        id
    }

    pub fn deny_action(&self, action: &str, decision: EvalDecision) {
        self.state
            .borrow_mut()
            .denied
            .insert(action.to_string(), decision);
    }

    pub fn set_caller_account(&self, account: &str) {
        if let Some(caller) = self.state.borrow_mut().caller.as_mut() {
            caller.account = account.to_string();
        }
    }

    pub fn disable_scp(&self) {
        if let Some(org) = self.state.borrow_mut().organization.as_mut() {
            org.available_policy_types.clear();
        }
    }

    /// Status sequence reported by the next `create_account` request. Without
    /// a script a request succeeds on its first poll.
    pub fn script_account_creation(&self, states: Vec<Scripted>) {
        self.state.borrow_mut().scripts.push_back(states);
    }

    /// Make every future call of `operation` fail with `code`.
    pub fn fail_on(&self, operation: &str, code: &str) {
        self.state.borrow_mut().failures.insert(
            operation.to_string(),
            ApiError::new(operation, code, "injected failure"),
        );
    }

    // -- inspection ----------------------------------------------------------

    pub fn calls(&self, operation: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn call_log(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn parent_of(&self, account_id: &str) -> Option<String> {
        self.state
            .borrow()
            .accounts
            .iter()
            .find(|a| a.account.id == account_id)
            .map(|a| a.parent.clone())
    }

    pub fn account_id_for(&self, email: &str) -> Option<String> {
        self.state
            .borrow()
            .accounts
            .iter()
            .find(|a| a.account.email == email)
            .map(|a| a.account.id.clone())
    }

    pub fn tags_of(&self, resource_id: &str) -> Vec<Tag> {
        self.state
            .borrow()
            .accounts
            .iter()
            .find(|a| a.account.id == resource_id)
            .map(|a| a.tags.clone())
            .unwrap_or_default()
    }

    pub fn ous_under(&self, parent_id: &str) -> Vec<OrganizationalUnit> {
        self.state
            .borrow()
            .ous
            .iter()
            .filter(|(p, _)| p == parent_id)
            .map(|(_, ou)| ou.clone())
            .collect()
    }

    pub fn is_attached(&self, target_id: &str, policy_id: &str) -> bool {
        self.state
            .borrow()
            .attachments
            .iter()
            .any(|(t, p)| t == target_id && p == policy_id)
    }

    pub fn policies(&self) -> Vec<PolicySummary> {
        self.state.borrow().policies.clone()
    }

    // -- internals -----------------------------------------------------------

    fn enter(&self, operation: &str) -> ApiResult<()> {
        let mut s = self.state.borrow_mut();
        s.calls.push(operation.to_string());
        match s.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn organization(&self, operation: &str) -> ApiResult<OrganizationInfo> {
        self.state.borrow().organization.clone().ok_or_else(|| {
            ApiError::new(
                operation,
                "AWSOrganizationsNotInUseException",
                "your account is not a member of an organization",
            )
        })
    }

    fn is_parent(s: &State, id: &str) -> bool {
        id == ROOT_ID || s.ous.iter().any(|(_, ou)| ou.id == id)
    }

    fn is_target(s: &State, id: &str) -> bool {
        Self::is_parent(s, id) || s.accounts.iter().any(|a| a.account.id == id)
    }
}

fn next_id(s: &mut State, prefix: &str) -> String {
    s.next_id += 1;
    format!("{prefix}-{}", s.next_id)
}

fn not_found(operation: &str, code: &str, id: &str) -> ApiError {
    ApiError::new(operation, code, format!("{id} not found"))
}

impl OrgApi for FakeOrg {
    fn create_organization(&self, feature_set: FeatureSet) -> ApiResult<OrganizationInfo> {
        let op = "create_organization";
        self.enter(op)?;
        if self.state.borrow().organization.is_some() {
            return Err(ApiError::new(
                op,
                ApiError::ALREADY_IN_ORGANIZATION,
                "the account is already a member of an organization",
            ));
        }
        let org = OrganizationInfo {
            id: "o-created".to_string(),
            arn: None,
            feature_set: Some(feature_set.as_str().to_string()),
            management_account_id: MANAGEMENT_ACCOUNT.to_string(),
            management_account_email: None,
            available_policy_types: Vec::new(),
        };
        self.state.borrow_mut().organization = Some(org.clone());
        Ok(org)
    }

    fn describe_organization(&self) -> ApiResult<OrganizationInfo> {
        let op = "describe_organization";
        self.enter(op)?;
        self.organization(op)
    }

    fn list_roots(&self) -> ApiResult<Vec<Root>> {
        let op = "list_roots";
        self.enter(op)?;
        self.organization(op)?;
        Ok(vec![Root {
            id: ROOT_ID.to_string(),
            name: Some("Root".to_string()),
        }])
    }

    fn create_organizational_unit(
        &self,
        parent_id: &str,
        name: &str,
        _tags: &[Tag],
    ) -> ApiResult<OrganizationalUnit> {
        let op = "create_organizational_unit";
        self.enter(op)?;
        if !Self::is_parent(&self.state.borrow(), parent_id) {
            return Err(not_found(op, "ParentNotFoundException", parent_id));
        }
        let id = self.add_ou(parent_id, name);
        Ok(OrganizationalUnit {
            id,
            name: name.to_string(),
        })
    }

    fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
    ) -> ApiResult<Vec<OrganizationalUnit>> {
        let op = "list_organizational_units_for_parent";
        self.enter(op)?;
        if !Self::is_parent(&self.state.borrow(), parent_id) {
            return Err(not_found(op, "ParentNotFoundException", parent_id));
        }
        Ok(self.ous_under(parent_id))
    }

    fn list_accounts_for_parent(&self, parent_id: &str) -> ApiResult<Vec<Account>> {
        let op = "list_accounts_for_parent";
        self.enter(op)?;
        let s = self.state.borrow();
        if !Self::is_parent(&s, parent_id) {
            return Err(not_found(op, "ParentNotFoundException", parent_id));
        }
        Ok(s.accounts
            .iter()
            .filter(|a| a.parent == parent_id)
            .map(|a| a.account.clone())
            .collect())
    }

    fn list_tags_for_resource(&self, resource_id: &str) -> ApiResult<Vec<Tag>> {
        let op = "list_tags_for_resource";
        self.enter(op)?;
        let s = self.state.borrow();
        s.accounts
            .iter()
            .find(|a| a.account.id == resource_id)
            .map(|a| a.tags.clone())
            .ok_or_else(|| not_found(op, "TargetNotFoundException", resource_id))
    }

    fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> ApiResult<()> {
        let op = "tag_resource";
        self.enter(op)?;
        let mut s = self.state.borrow_mut();
        let account = s
            .accounts
            .iter_mut()
            .find(|a| a.account.id == resource_id)
            .ok_or_else(|| not_found(op, "TargetNotFoundException", resource_id))?;
        for tag in tags {
            account.tags.retain(|t| t.key != tag.key);
            account.tags.push(tag.clone());
        }
        Ok(())
    }

    fn untag_resource(&self, resource_id: &str, tag_keys: &[String]) -> ApiResult<()> {
        let op = "untag_resource";
        self.enter(op)?;
        let mut s = self.state.borrow_mut();
        let account = s
            .accounts
            .iter_mut()
            .find(|a| a.account.id == resource_id)
            .ok_or_else(|| not_found(op, "TargetNotFoundException", resource_id))?;
        account.tags.retain(|t| !tag_keys.contains(&t.key));
        Ok(())
    }

    fn create_account(
        &self,
        email: &str,
        name: &str,
        tags: &[Tag],
    ) -> ApiResult<CreateAccountStatus> {
        let op = "create_account";
        self.enter(op)?;
        let mut s = self.state.borrow_mut();
        let request_id = next_id(&mut s, "car");
        let script = s
            .scripts
            .pop_front()
            .unwrap_or_else(|| vec![Scripted::Succeeded]);
        let status = CreateAccountStatus {
            request_id: request_id.clone(),
            state: CreateAccountState::InProgress,
            account_id: None,
            failure_reason: None,
        };
        s.requests.insert(
            request_id,
            PendingRequest {
                email: email.to_string(),
                name: name.to_string(),
                tags: tags.to_vec(),
                script: script.into(),
                last: status.clone(),
            },
        );
        Ok(status)
    }

    fn describe_create_account_status(&self, request_id: &str) -> ApiResult<CreateAccountStatus> {
        let op = "describe_create_account_status";
        self.enter(op)?;
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;
        let request = s
            .requests
            .get_mut(request_id)
            .ok_or_else(|| not_found(op, "CreateAccountStatusNotFoundException", request_id))?;
        let Some(step) = request.script.pop_front() else {
            return Ok(request.last.clone());
        };
        let status = match step {
            Scripted::InProgress => CreateAccountStatus {
                state: CreateAccountState::InProgress,
                ..request.last.clone()
            },
            Scripted::Failed(reason) => CreateAccountStatus {
                state: CreateAccountState::Failed,
                failure_reason: Some(reason.to_string()),
                ..request.last.clone()
            },
            Scripted::Succeeded => {
                s.next_id += 1;
                let account_id = format!("acct-{}", s.next_id);
                s.accounts.push(FakeAccount {
                    parent: ROOT_ID.to_string(),
                    account: Account {
                        id: account_id.clone(),
                        email: request.email.clone(),
                        name: Some(request.name.clone()),
                    },
                    tags: request.tags.clone(),
                });
                CreateAccountStatus {
                    state: CreateAccountState::Succeeded,
                    account_id: Some(account_id),
                    ..request.last.clone()
                }
            }
        };
        request.last = status.clone();
        Ok(status)
    }

    fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> ApiResult<()> {
        let op = "move_account";
        self.enter(op)?;
        let mut s = self.state.borrow_mut();
        if !Self::is_parent(&s, destination_parent_id) {
            return Err(not_found(
                op,
                "DestinationParentNotFoundException",
                destination_parent_id,
            ));
        }
        let account = s
            .accounts
            .iter_mut()
            .find(|a| a.account.id == account_id)
            .ok_or_else(|| not_found(op, "AccountNotFoundException", account_id))?;
        if account.parent != source_parent_id {
            return Err(not_found(op, "SourceParentNotFoundException", source_parent_id));
        }
        account.parent = destination_parent_id.to_string();
        Ok(())
    }

    fn create_policy(
        &self,
        name: &str,
        _description: &str,
        content: &str,
    ) -> ApiResult<PolicySummary> {
        let op = "create_policy";
        self.enter(op)?;
        if serde_json::from_str::<serde_json::Value>(content).is_err() {
            return Err(ApiError::new(
                op,
                "MalformedPolicyDocumentException",
                "policy content is not JSON",
            ));
        }
        if self.state.borrow().policies.iter().any(|p| p.name == name) {
            return Err(ApiError::new(
                op,
                "DuplicatePolicyException",
                format!("a policy named {name} already exists"),
            ));
        }
        let id = self.add_policy(name);
        Ok(PolicySummary {
            id,
            name: name.to_string(),
            aws_managed: false,
        })
    }

    fn list_policies(&self) -> ApiResult<Vec<PolicySummary>> {
        self.enter("list_policies")?;
        Ok(self.policies())
    }

    fn describe_policy(&self, policy_id: &str) -> ApiResult<PolicySummary> {
        let op = "describe_policy";
        self.enter(op)?;
        self.policies()
            .into_iter()
            .find(|p| p.id == policy_id)
            .ok_or_else(|| not_found(op, "PolicyNotFoundException", policy_id))
    }

    fn attach_policy(&self, target_id: &str, policy_id: &str) -> ApiResult<()> {
        let op = "attach_policy";
        self.enter(op)?;
        let mut s = self.state.borrow_mut();
        if !Self::is_target(&s, target_id) {
            return Err(not_found(op, "TargetNotFoundException", target_id));
        }
        if !s.policies.iter().any(|p| p.id == policy_id) {
            return Err(not_found(op, "PolicyNotFoundException", policy_id));
        }
        let pair = (target_id.to_string(), policy_id.to_string());
        if s.attachments.contains(&pair) {
            return Err(ApiError::new(
                op,
                ApiError::DUPLICATE_POLICY_ATTACHMENT,
                "the policy is already attached to the target",
            ));
        }
        s.attachments.push(pair);
        Ok(())
    }

    fn simulate_principal_policy(
        &self,
        _principal_arn: &str,
        action_names: &[String],
    ) -> ApiResult<Vec<ActionEvaluation>> {
        self.enter("simulate_principal_policy")?;
        let s = self.state.borrow();
        Ok(action_names
            .iter()
            .map(|action| ActionEvaluation {
                action: action.clone(),
                decision: s
                    .denied
                    .get(action)
                    .copied()
                    .unwrap_or(EvalDecision::Allowed),
            })
            .collect())
    }

    fn get_caller_identity(&self) -> ApiResult<CallerIdentity> {
        let op = "get_caller_identity";
        self.enter(op)?;
        self.state.borrow().caller.clone().ok_or_else(|| {
            ApiError::new(op, "InvalidClientTokenId", "no credentials configured")
        })
    }
}
