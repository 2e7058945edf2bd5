//! Blocking [`OrgApi`] implementation backed by the AWS SDK.
//!
//! The SDK is async; each call is driven to completion on a private
//! current-thread tokio runtime so the pipeline stays synchronous.

mod convert;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_organizations::operation::create_account::builders::CreateAccountFluentBuilder;
use aws_sdk_organizations::types as org;
use convert::{api_error, missing};
use orgsync_core::api::{
    Account, ActionEvaluation, CallerIdentity, CreateAccountStatus, FeatureSet, OrgApi,
    OrganizationInfo, OrganizationalUnit, PolicySummary, Root, Tag,
};
use orgsync_core::config::AwsConfig;
use orgsync_core::error::ApiResult;
use std::future::Future;
use tokio::runtime::Runtime;

pub struct AwsOrgClient {
    runtime: Runtime,
    organizations: aws_sdk_organizations::Client,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsOrgClient {
    pub fn new(cfg: &AwsConfig) -> orgsync_core::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &cfg.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &cfg.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &cfg.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = runtime.block_on(loader.load());

        tracing::debug!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            profile = ?cfg.profile,
            endpoint = ?cfg.endpoint_url,
            "AWS clients initialized"
        );

        Ok(Self {
            organizations: aws_sdk_organizations::Client::new(&sdk_config),
            iam: aws_sdk_iam::Client::new(&sdk_config),
            sts: aws_sdk_sts::Client::new(&sdk_config),
            runtime,
        })
    }

    fn block<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Member accounts are created with billing access denied to their IAM users.
fn create_account_request(
    client: &aws_sdk_organizations::Client,
    op: &str,
    email: &str,
    name: &str,
    tags: &[Tag],
) -> ApiResult<CreateAccountFluentBuilder> {
    Ok(client
        .create_account()
        .email(email)
        .account_name(name)
        .iam_user_access_to_billing(org::IamUserAccessToBilling::Deny)
        .set_tags(Some(convert::tags_to_sdk(op, tags)?)))
}

impl OrgApi for AwsOrgClient {
    fn create_organization(&self, feature_set: FeatureSet) -> ApiResult<OrganizationInfo> {
        let op = "create_organization";
        let out = self
            .block(
                self.organizations
                    .create_organization()
                    .feature_set(org::OrganizationFeatureSet::from(feature_set.as_str()))
                    .send(),
            )
            .map_err(|e| api_error(op, e))?;
        out.organization()
            .map(convert::organization)
            .ok_or_else(|| missing(op, "organization"))
    }

    fn describe_organization(&self) -> ApiResult<OrganizationInfo> {
        let op = "describe_organization";
        let out = self
            .block(self.organizations.describe_organization().send())
            .map_err(|e| api_error(op, e))?;
        out.organization()
            .map(convert::organization)
            .ok_or_else(|| missing(op, "organization"))
    }

    fn list_roots(&self) -> ApiResult<Vec<Root>> {
        let op = "list_roots";
        let roots = self
            .block(
                self.organizations
                    .list_roots()
                    .into_paginator()
                    .send()
                    .collect::<Result<Vec<_>, _>>(),
            )
            .map_err(|e| api_error(op, e))?;
        Ok(roots
            .iter()
            .flat_map(|page| page.roots())
            .map(convert::root)
            .collect())
    }

    fn create_organizational_unit(
        &self,
        parent_id: &str,
        name: &str,
        tags: &[Tag],
    ) -> ApiResult<OrganizationalUnit> {
        let op = "create_organizational_unit";
        let mut request = self
            .organizations
            .create_organizational_unit()
            .parent_id(parent_id)
            .name(name);
        if !tags.is_empty() {
            request = request.set_tags(Some(convert::tags_to_sdk(op, tags)?));
        }
        let out = self.block(request.send()).map_err(|e| api_error(op, e))?;
        out.organizational_unit()
            .map(convert::organizational_unit)
            .ok_or_else(|| missing(op, "organizational unit"))
    }

    fn list_organizational_units_for_parent(
        &self,
        parent_id: &str,
    ) -> ApiResult<Vec<OrganizationalUnit>> {
        let op = "list_organizational_units_for_parent";
        let ous = self
            .block(
                self.organizations
                    .list_organizational_units_for_parent()
                    .parent_id(parent_id)
                    .into_paginator()
                    .send()
                    .collect::<Result<Vec<_>, _>>(),
            )
            .map_err(|e| api_error(op, e))?;
        Ok(ous
            .iter()
            .flat_map(|page| page.organizational_units())
            .map(convert::organizational_unit)
            .collect())
    }

    fn list_accounts_for_parent(&self, parent_id: &str) -> ApiResult<Vec<Account>> {
        let op = "list_accounts_for_parent";
        let accounts = self
            .block(
                self.organizations
                    .list_accounts_for_parent()
                    .parent_id(parent_id)
                    .into_paginator()
                    .send()
                    .collect::<Result<Vec<_>, _>>(),
            )
            .map_err(|e| api_error(op, e))?;
        Ok(accounts
            .iter()
            .flat_map(|page| page.accounts())
            .map(convert::account)
            .collect())
    }

    fn list_tags_for_resource(&self, resource_id: &str) -> ApiResult<Vec<Tag>> {
        let op = "list_tags_for_resource";
        let tags = self
            .block(
                self.organizations
                    .list_tags_for_resource()
                    .resource_id(resource_id)
                    .into_paginator()
                    .items()
                    .send()
                    .collect::<Result<Vec<_>, _>>(),
            )
            .map_err(|e| api_error(op, e))?;
        Ok(tags.iter().map(convert::tag).collect())
    }

    fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> ApiResult<()> {
        let op = "tag_resource";
        self.block(
            self.organizations
                .tag_resource()
                .resource_id(resource_id)
                .set_tags(Some(convert::tags_to_sdk(op, tags)?))
                .send(),
        )
        .map_err(|e| api_error(op, e))?;
        Ok(())
    }

    fn untag_resource(&self, resource_id: &str, tag_keys: &[String]) -> ApiResult<()> {
        let op = "untag_resource";
        self.block(
            self.organizations
                .untag_resource()
                .resource_id(resource_id)
                .set_tag_keys(Some(tag_keys.to_vec()))
                .send(),
        )
        .map_err(|e| api_error(op, e))?;
        Ok(())
    }

    fn create_account(
        &self,
        email: &str,
        name: &str,
        tags: &[Tag],
    ) -> ApiResult<CreateAccountStatus> {
        let op = "create_account";
        let out = self
            .block(create_account_request(&self.organizations, op, email, name, tags)?.send())
            .map_err(|e| api_error(op, e))?;
        let status = out
            .create_account_status()
            .ok_or_else(|| missing(op, "create account status"))?;
        convert::create_account_status(op, status)
    }

    fn describe_create_account_status(&self, request_id: &str) -> ApiResult<CreateAccountStatus> {
        let op = "describe_create_account_status";
        let out = self
            .block(
                self.organizations
                    .describe_create_account_status()
                    .create_account_request_id(request_id)
                    .send(),
            )
            .map_err(|e| api_error(op, e))?;
        let status = out
            .create_account_status()
            .ok_or_else(|| missing(op, "create account status"))?;
        convert::create_account_status(op, status)
    }

    fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> ApiResult<()> {
        let op = "move_account";
        self.block(
            self.organizations
                .move_account()
                .account_id(account_id)
                .source_parent_id(source_parent_id)
                .destination_parent_id(destination_parent_id)
                .send(),
        )
        .map_err(|e| api_error(op, e))?;
        Ok(())
    }

    fn create_policy(
        &self,
        name: &str,
        description: &str,
        content: &str,
    ) -> ApiResult<PolicySummary> {
        let op = "create_policy";
        let out = self
            .block(
                self.organizations
                    .create_policy()
                    .name(name)
                    .description(description)
                    .content(content)
                    .r#type(org::PolicyType::ServiceControlPolicy)
                    .send(),
            )
            .map_err(|e| api_error(op, e))?;
        out.policy()
            .and_then(|p| p.policy_summary())
            .map(convert::policy_summary)
            .ok_or_else(|| missing(op, "policy summary"))
    }

    fn list_policies(&self) -> ApiResult<Vec<PolicySummary>> {
        let op = "list_policies";
        let policies = self
            .block(
                self.organizations
                    .list_policies()
                    .filter(org::PolicyType::ServiceControlPolicy)
                    .into_paginator()
                    .send()
                    .collect::<Result<Vec<_>, _>>(),
            )
            .map_err(|e| api_error(op, e))?;
        Ok(policies
            .iter()
            .flat_map(|page| page.policies())
            .map(convert::policy_summary)
            .collect())
    }

    fn describe_policy(&self, policy_id: &str) -> ApiResult<PolicySummary> {
        let op = "describe_policy";
        let out = self
            .block(self.organizations.describe_policy().policy_id(policy_id).send())
            .map_err(|e| api_error(op, e))?;
        out.policy()
            .and_then(|p| p.policy_summary())
            .map(convert::policy_summary)
            .ok_or_else(|| missing(op, "policy summary"))
    }

    fn attach_policy(&self, target_id: &str, policy_id: &str) -> ApiResult<()> {
        let op = "attach_policy";
        self.block(
            self.organizations
                .attach_policy()
                .target_id(target_id)
                .policy_id(policy_id)
                .send(),
        )
        .map_err(|e| api_error(op, e))?;
        Ok(())
    }

    fn simulate_principal_policy(
        &self,
        principal_arn: &str,
        action_names: &[String],
    ) -> ApiResult<Vec<ActionEvaluation>> {
        let op = "simulate_principal_policy";
        let mut evaluations = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let out = self
                .block(
                    self.iam
                        .simulate_principal_policy()
                        .policy_source_arn(principal_arn)
                        .set_action_names(Some(action_names.to_vec()))
                        .set_marker(marker.take())
                        .send(),
                )
                .map_err(|e| api_error(op, e))?;
            evaluations.extend(out.evaluation_results().iter().map(convert::action_evaluation));
            match out.marker() {
                Some(next) if out.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(evaluations)
    }

    fn get_caller_identity(&self) -> ApiResult<CallerIdentity> {
        let op = "get_caller_identity";
        let out = self
            .block(self.sts.get_caller_identity().send())
            .map_err(|e| api_error(op, e))?;
        Ok(CallerIdentity {
            account: out.account().ok_or_else(|| missing(op, "account"))?.to_string(),
            arn: out.arn().ok_or_else(|| missing(op, "arn"))?.to_string(),
        })
    }
}
