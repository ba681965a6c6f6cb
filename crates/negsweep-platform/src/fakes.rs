//! In-memory fake for the ad platform (testing only)
//!
//! `MemoryAdAccountService` satisfies the `AdAccountService` contract without
//! any network access. It also counts calls per operation and can be told to
//! fail specific operations, so callers can assert on remote mutation counts
//! and failure isolation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::account_service::*;
use crate::error::PlatformError;

/// Operations of [`AdAccountService`], for counters and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    ListCampaigns,
    QueryTerms,
    FindList,
    CreateList,
    ListCriteria,
    CreateCriteria,
}

#[derive(Debug, Clone)]
struct FakeList {
    id: SharedListId,
    name: String,
    list_type: SharedListType,
    criteria: Vec<String>,
}

#[derive(Debug, Default)]
struct FakeAccount {
    campaigns: Vec<CampaignSummary>,
    terms: HashMap<String, Vec<String>>,
    lists: Vec<FakeList>,
}

#[derive(Debug, Clone)]
struct FailureRule {
    account: AccountId,
    op: FakeOp,
    list_name: Option<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    accounts: HashMap<AccountId, FakeAccount>,
    failures: Vec<FailureRule>,
    calls: HashMap<FakeOp, usize>,
    submitted: Vec<(AccountId, SharedListId, Vec<CriterionDraft>)>,
    next_id: u64,
}

impl FakeState {
    fn record(&mut self, op: FakeOp) {
        *self.calls.entry(op).or_insert(0) += 1;
    }

    fn check(&self, account: &AccountId, op: FakeOp, list_name: Option<&str>) -> PlatformResult<()> {
        let hit = self.failures.iter().any(|rule| {
            rule.account == *account
                && rule.op == op
                && rule
                    .list_name
                    .as_deref()
                    .map_or(true, |name| Some(name) == list_name)
        });
        if hit {
            return Err(PlatformError::request(
                format!("{op:?}"),
                format!("injected failure for account {account}"),
            ));
        }
        Ok(())
    }

    fn account(&self, account: &AccountId) -> PlatformResult<&FakeAccount> {
        self.accounts.get(account).ok_or_else(|| {
            PlatformError::request("lookup", format!("customer {account} not found"))
        })
    }

    fn account_mut(&mut self, account: &AccountId) -> PlatformResult<&mut FakeAccount> {
        self.accounts.get_mut(account).ok_or_else(|| {
            PlatformError::request("lookup", format!("customer {account} not found"))
        })
    }

    fn list_name(&self, account: &AccountId, list: &SharedListId) -> Option<String> {
        self.accounts
            .get(account)?
            .lists
            .iter()
            .find(|l| l.id == *list)
            .map(|l| l.name.clone())
    }
}

/// In-memory ad platform keyed by account id.
#[derive(Debug, Default)]
pub struct MemoryAdAccountService {
    state: Mutex<FakeState>,
}

impl MemoryAdAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account with no campaigns or lists.
    pub fn add_account(&self, account: &AccountId) {
        let mut state = self.state.lock().unwrap();
        state.accounts.entry(account.clone()).or_default();
    }

    /// Register an enabled search campaign with its matched search terms.
    pub fn add_campaign(&self, account: &AccountId, campaign_id: &str, terms: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let acct = state.accounts.entry(account.clone()).or_default();
        acct.campaigns.push(CampaignSummary {
            campaign_id: campaign_id.to_string(),
            name: format!("Campaign {campaign_id}"),
        });
        acct.terms.insert(
            campaign_id.to_string(),
            terms.iter().map(|t| t.to_string()).collect(),
        );
    }

    /// Seed a negative keyword list with existing criteria.
    pub fn add_list(&self, account: &AccountId, name: &str, criteria: &[&str]) -> SharedListId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = SharedListId(format!("{}", 1000 + state.next_id));
        let acct = state.accounts.entry(account.clone()).or_default();
        acct.lists.push(FakeList {
            id: id.clone(),
            name: name.to_string(),
            list_type: SharedListType::NegativeKeywords,
            criteria: criteria.iter().map(|c| c.to_string()).collect(),
        });
        id
    }

    /// Fail every call to `op` for `account`.
    pub fn fail_on(&self, account: &AccountId, op: FakeOp) {
        let mut state = self.state.lock().unwrap();
        state.failures.push(FailureRule {
            account: account.clone(),
            op,
            list_name: None,
        });
    }

    /// Fail calls to `op` for `account` that target the list named `list_name`.
    pub fn fail_on_list(&self, account: &AccountId, op: FakeOp, list_name: &str) {
        let mut state = self.state.lock().unwrap();
        state.failures.push(FailureRule {
            account: account.clone(),
            op,
            list_name: Some(list_name.to_string()),
        });
    }

    /// Criteria text of the first list named `name`, if it exists.
    pub fn criteria(&self, account: &AccountId, name: &str) -> Option<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .get(account)?
            .lists
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.criteria.clone())
    }

    /// How many lists named `name` exist for the account.
    pub fn list_count(&self, account: &AccountId, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .accounts
            .get(account)
            .map(|a| a.lists.iter().filter(|l| l.name == name).count())
            .unwrap_or(0)
    }

    /// Number of calls made to `op`, failed calls included.
    pub fn call_count(&self, op: FakeOp) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls that could change remote state.
    pub fn mutation_count(&self) -> usize {
        self.call_count(FakeOp::CreateList) + self.call_count(FakeOp::CreateCriteria)
    }

    /// Every successful `create_criteria` batch, in call order.
    pub fn submitted_batches(&self) -> Vec<(AccountId, SharedListId, Vec<CriterionDraft>)> {
        self.state.lock().unwrap().submitted.clone()
    }
}

#[async_trait]
impl AdAccountService for MemoryAdAccountService {
    async fn list_enabled_search_campaigns(
        &self,
        account: &AccountId,
    ) -> PlatformResult<Vec<CampaignSummary>> {
        let mut state = self.state.lock().unwrap();
        state.record(FakeOp::ListCampaigns);
        state.check(account, FakeOp::ListCampaigns, None)?;
        Ok(state.account(account)?.campaigns.clone())
    }

    async fn query_search_terms(
        &self,
        account: &AccountId,
        campaign_id: &str,
        _range: &DateRange,
    ) -> PlatformResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.record(FakeOp::QueryTerms);
        state.check(account, FakeOp::QueryTerms, None)?;
        Ok(state
            .account(account)?
            .terms
            .get(campaign_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_shared_list(
        &self,
        account: &AccountId,
        name: &str,
        list_type: SharedListType,
    ) -> PlatformResult<Option<SharedListId>> {
        let mut state = self.state.lock().unwrap();
        state.record(FakeOp::FindList);
        state.check(account, FakeOp::FindList, Some(name))?;
        Ok(state
            .account(account)?
            .lists
            .iter()
            .find(|l| l.name == name && l.list_type == list_type)
            .map(|l| l.id.clone()))
    }

    async fn create_shared_list(
        &self,
        account: &AccountId,
        name: &str,
        list_type: SharedListType,
    ) -> PlatformResult<SharedListId> {
        let mut state = self.state.lock().unwrap();
        state.record(FakeOp::CreateList);
        state.check(account, FakeOp::CreateList, Some(name))?;
        state.next_id += 1;
        let id = SharedListId(format!("{}", 1000 + state.next_id));
        state.account_mut(account)?.lists.push(FakeList {
            id: id.clone(),
            name: name.to_string(),
            list_type,
            criteria: Vec::new(),
        });
        Ok(id)
    }

    async fn list_criteria_text(
        &self,
        account: &AccountId,
        list: &SharedListId,
    ) -> PlatformResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.record(FakeOp::ListCriteria);
        let name = state.list_name(account, list);
        state.check(account, FakeOp::ListCriteria, name.as_deref())?;
        state
            .account(account)?
            .lists
            .iter()
            .find(|l| l.id == *list)
            .map(|l| l.criteria.clone())
            .ok_or_else(|| PlatformError::request("list_criteria_text", format!("no list {list}")))
    }

    async fn create_criteria(
        &self,
        account: &AccountId,
        list: &SharedListId,
        criteria: &[CriterionDraft],
    ) -> PlatformResult<()> {
        let mut state = self.state.lock().unwrap();
        state.record(FakeOp::CreateCriteria);
        let name = state.list_name(account, list);
        state.check(account, FakeOp::CreateCriteria, name.as_deref())?;
        let target = state
            .account_mut(account)?
            .lists
            .iter_mut()
            .find(|l| l.id == *list)
            .ok_or_else(|| PlatformError::request("create_criteria", format!("no list {list}")))?;
        target
            .criteria
            .extend(criteria.iter().map(|c| c.text.clone()));
        state
            .submitted
            .push((account.clone(), list.clone(), criteria.to_vec()));
        Ok(())
    }
}
